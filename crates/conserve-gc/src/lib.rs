//! A conservative mark-and-sweep garbage collector for raw allocations.
//!
//! `conserve-gc` hands out untyped, zeroed memory from one fixed-size arena
//! and reclaims it automatically. Callers never free anything and never tell
//! the collector where their pointers are: a collection scans the thread's
//! stack and callee-saved registers for words that look like addresses into
//! the arena, then follows such words through object payloads.
//!
//! # Features
//!
//! - **No cooperation needed**: no type information, no root registration
//! - **Free-list allocator**: first fit with splitting, address-ordered
//!   coalescing after every sweep
//! - **Threshold policy**: collects before an allocation would push usage past
//!   a configurable share of the arena, and again before giving up
//! - **Explicit contexts**: any number of independent [`Collector`]s, plus a
//!   per-thread default behind the free functions in [`global`]
//!
//! # Quick Start
//!
//! ```
//! use conserve_gc::global;
//!
//! global::init();
//!
//! let buf = global::allocate(64).unwrap();
//! unsafe { buf.as_ptr().write(1) };
//!
//! // `buf` is still on the stack, so it survives.
//! global::collect();
//! assert_eq!(unsafe { buf.as_ptr().read() }, 1);
//!
//! println!("{}", global::stats());
//! ```
//!
//! # Conservativeness
//!
//! Any aligned word that happens to hold an address inside the arena keeps
//! the object it points into alive, whether or not it really is a pointer.
//! Such false roots delay reclamation by a collection or more; they never
//! free live memory.
//!
//! # Thread Safety
//!
//! A [`Collector`] is `!Send` and `!Sync`. It scans the stack of the thread
//! that created it and must stay on that thread.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod collector;
mod config;
mod error;
mod gc;
pub mod global;
mod metrics;
mod roots;
mod scan;
mod stack;
mod tracing;

/// Arena memory management internals.
///
/// This module is public for testing and advanced use cases.
/// Most users should use [`Collector`] directly.
pub mod heap;

// Re-export public API
pub use collector::Collector;
pub use config::{
    default_collect_condition, CollectCondition, CollectInfo, GcConfig, DEFAULT_ARENA_SIZE,
    DEFAULT_THRESHOLD,
};
pub use error::{AllocError, GcError};
pub use gc::HeapViolation;
pub use metrics::{CollectionTrigger, GcMetrics, GcStats, PhaseTimer};
pub use stack::StackBottom;
pub use crate::tracing::GcId;

#[cfg(any(test, feature = "test-util"))]
#[doc(hidden)]
pub mod test_util {
    /// Clear CPU registers to prevent stale pointer values from being treated as roots.
    ///
    /// Useful in tests that expect an object to be reclaimed after the
    /// helper that allocated it has returned.
    ///
    /// # Safety
    ///
    /// This function clears callee-saved registers (R12-R15 on `x86_64`,
    /// X20-X28 on `aarch64`). It should only be called when those registers
    /// don't contain values needed by the calling code.
    pub unsafe fn clear_registers() {
        // SAFETY: Caller guarantees that callee-saved registers don't contain
        // values needed by the calling code.
        unsafe { crate::stack::clear_registers() };
    }

    /// Scan the current stack and registers the way a collection does,
    /// reporting every word that lies inside `range`.
    pub fn stack_words_in(range: std::ops::Range<usize>) -> Vec<usize> {
        let mut registers = crate::stack::RegisterSnapshot::new();
        let mut found = Vec::new();
        crate::roots::scan_roots(crate::StackBottom::thread(), &mut registers, |word| {
            if range.contains(&word) {
                found.push(word);
            }
            false
        });
        found
    }
}
