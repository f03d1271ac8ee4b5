//! Process-wide default collector.
//!
//! Drop-in style free functions backed by a collector that lives in a
//! thread-local slot, created on first use with the default configuration.
//! Each thread that allocates gets its own arena and scans only its own
//! stack.

use std::cell::RefCell;
use std::ptr::NonNull;

use crate::collector::Collector;
use crate::config::GcConfig;
use crate::error::{AllocError, GcError};
use crate::metrics::{GcMetrics, GcStats};
use crate::stack::StackBottom;

thread_local! {
    static COLLECTOR: RefCell<Option<Collector>> = const { RefCell::new(None) };
}

/// Creates the default collector for this thread if it does not exist yet.
///
/// Call this as early as possible, e.g. first thing in `main`.
#[inline(always)]
pub fn init() {
    init_with(GcConfig::new(), StackBottom::thread());
}

/// Like [`init`], scanning the stack only up to `bottom`.
pub fn init_with_stack_bottom(bottom: StackBottom) {
    init_with(GcConfig::new(), bottom);
}

/// Creates the default collector with an explicit configuration.
///
/// Does nothing if this thread already has one. If the arena cannot be
/// mapped the process aborts: there is nowhere to allocate from.
pub fn init_with(config: GcConfig, bottom: StackBottom) {
    COLLECTOR.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(create_or_abort(config, bottom));
        }
    });
}

/// Whether this thread's default collector exists.
#[must_use]
pub fn is_initialized() -> bool {
    COLLECTOR.with(|slot| slot.borrow().is_some())
}

fn create_or_abort(config: GcConfig, bottom: StackBottom) -> Collector {
    match Collector::with_stack_bottom(config, bottom) {
        Ok(collector) => collector,
        Err(err) => fatal(&err),
    }
}

#[cold]
fn fatal(err: &GcError) -> ! {
    crate::tracing::internal::log_init_failed(err);
    eprintln!("conserve-gc: {err}");
    std::process::abort()
}

#[inline(always)]
fn with_collector<R>(f: impl FnOnce(&mut Collector) -> R) -> R {
    COLLECTOR.with(|slot| {
        let mut slot = slot.borrow_mut();
        let collector =
            slot.get_or_insert_with(|| create_or_abort(GcConfig::new(), StackBottom::thread()));
        f(collector)
    })
}

/// Allocates `size` zeroed bytes from this thread's collector.
///
/// # Errors
///
/// See [`Collector::allocate`].
pub fn allocate(size: usize) -> Result<NonNull<u8>, AllocError> {
    with_collector(|gc| gc.allocate(size))
}

/// Allocates zeroed space for `count` elements of `size` bytes.
///
/// # Errors
///
/// See [`Collector::zero_allocate`].
pub fn zero_allocate(count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
    with_collector(|gc| gc.zero_allocate(count, size))
}

/// Resizes an allocation.
///
/// # Errors
///
/// See [`Collector::resize`].
pub fn resize(ptr: Option<NonNull<u8>>, new_size: usize) -> Result<Option<NonNull<u8>>, AllocError> {
    with_collector(|gc| gc.resize(ptr, new_size))
}

/// Does nothing; memory is reclaimed by collection.
pub const fn deallocate(_ptr: Option<NonNull<u8>>) {}

/// Runs a full collection on this thread's collector.
pub fn collect() {
    with_collector(Collector::collect);
}

/// Statistics of this thread's collector, all zero before first use.
#[must_use]
pub fn stats() -> GcStats {
    COLLECTOR.with(|slot| slot.borrow().as_ref().map(Collector::stats).unwrap_or_default())
}

/// Results of this thread's most recent collection.
#[must_use]
pub fn metrics() -> GcMetrics {
    COLLECTOR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(Collector::metrics)
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_initialization() {
        assert!(!is_initialized());
        assert_eq!(stats(), GcStats::default());

        let ptr = allocate(24).unwrap();
        assert!(is_initialized());
        assert_eq!(stats().allocations, 1);
        assert_eq!(stats().arena_size, crate::config::DEFAULT_ARENA_SIZE);
        std::hint::black_box(ptr);
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        let first = stats();
        allocate(8).unwrap();
        init();
        init_with(GcConfig::new().arena_size(4096), StackBottom::thread());
        assert_eq!(stats().allocations, first.allocations + 1);
        assert_eq!(stats().arena_size, first.arena_size);
    }

    #[test]
    fn test_free_functions_round_trip() {
        let ptr = zero_allocate(4, 16).unwrap();
        unsafe { ptr.as_ptr().write(0x5a) };

        let grown = resize(Some(ptr), 256).unwrap().unwrap();
        assert_eq!(unsafe { grown.as_ptr().read() }, 0x5a);
        assert_eq!(resize(Some(grown), 0).unwrap(), None);

        deallocate(Some(grown));
        collect();
        assert_eq!(metrics().total_collections, stats().collections);
        assert!(stats().collections >= 1);
        std::hint::black_box(grown);
    }
}
