//! The collector context and its allocation API.

use std::ptr::NonNull;

use crate::config::{CollectInfo, GcConfig};
use crate::error::{AllocError, GcError};
use crate::gc::{self, HeapViolation, Marker};
use crate::heap::{align_up, Arena, FreeList, Object, Registry, HEADER_SIZE};
use crate::metrics::{CollectionTrigger, GcMetrics, GcStats, PhaseTimer};
use crate::roots;
use crate::stack::{RegisterSnapshot, StackBottom};
use crate::tracing::internal::{self as trace, next_gc_id, GcPhase};

/// A conservative mark-sweep collector over one fixed-size arena.
///
/// Allocations are never freed explicitly. A collection scans the stack of
/// the thread that created the collector, plus its callee-saved registers,
/// for words that look like addresses inside the arena; everything not
/// reachable from such a word through other objects is reclaimed.
///
/// A collector must only be used from the thread whose stack it scans.
///
/// # Example
///
/// ```
/// use conserve_gc::{Collector, GcConfig};
///
/// let mut gc = Collector::new(GcConfig::new().arena_size(64 * 1024)).unwrap();
/// let ptr = gc.allocate(32).unwrap();
/// unsafe { ptr.as_ptr().write(7) };
///
/// gc.collect();
/// assert_eq!(unsafe { ptr.as_ptr().read() }, 7);
/// ```
pub struct Collector {
    arena: Arena,
    free: FreeList,
    objects: Registry,
    stack_bottom: StackBottom,
    registers: RegisterSnapshot,
    config: GcConfig,
    collections: usize,
    allocations: usize,
    last_metrics: GcMetrics,
}

impl Collector {
    /// Creates a collector scanning the current thread's whole stack.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the arena cannot be mapped.
    #[inline(always)]
    pub fn new(config: GcConfig) -> Result<Self, GcError> {
        Self::with_stack_bottom(config, StackBottom::thread())
    }

    /// Creates a collector that scans the stack up to `bottom`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the arena cannot be mapped.
    pub fn with_stack_bottom(config: GcConfig, bottom: StackBottom) -> Result<Self, GcError> {
        config.validate()?;
        let arena = Arena::map(config.get_arena_size())?;
        // SAFETY: the arena is freshly mapped, page aligned and unused.
        let free = unsafe { FreeList::from_region(arena.base(), arena.size()) };
        trace::log_arena_mapped(arena.base().as_ptr() as usize, arena.size());

        Ok(Self {
            arena,
            free,
            objects: Registry::new(),
            stack_bottom: bottom,
            registers: RegisterSnapshot::new(),
            config,
            collections: 0,
            allocations: 0,
            last_metrics: GcMetrics::default(),
        })
    }

    /// Allocates `size` zeroed bytes, aligned to 8.
    ///
    /// May run a collection first when usage is past the threshold, and once
    /// more if no free span fits.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] if the request cannot be satisfied even
    /// after a full collection.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let oom = AllocError::OutOfMemory { requested: size };
        // Zero-byte requests still get an addressable payload.
        let payload = align_up(size.max(1)).ok_or(oom)?;
        let span = payload.checked_add(HEADER_SIZE).ok_or(oom)?;

        let info = CollectInfo::new(
            self.arena.size(),
            self.arena.used(),
            span,
            self.config.get_threshold(),
        );
        if (self.config.condition())(&info) {
            trace::log_threshold_exceeded(info.bytes_in_use(), span);
            self.collect_with(CollectionTrigger::Threshold);
        }

        let (block, granted) = if let Some(found) = self.free.acquire(span) {
            found
        } else {
            self.collect_with(CollectionTrigger::AllocationFailure);
            let Some(found) = self.free.acquire(span) else {
                trace::log_out_of_memory(size, self.free.largest());
                return Err(oom);
            };
            found
        };

        // SAFETY: the free list handed out `granted` unused, aligned bytes.
        let object = unsafe { Object::init(block, granted - HEADER_SIZE) };
        self.objects.push(object);
        self.arena.charge(granted);
        self.allocations += 1;
        Ok(object.payload())
    }

    /// Allocates zeroed space for `count` elements of `size` bytes.
    ///
    /// # Errors
    ///
    /// [`AllocError::SizeOverflow`] if `count * size` overflows, otherwise as
    /// [`allocate`](Self::allocate).
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        let total = count
            .checked_mul(size)
            .ok_or(AllocError::SizeOverflow { count, size })?;
        self.allocate(total)
    }

    /// Resizes an allocation, moving it if it has to grow.
    ///
    /// - `None` behaves as [`allocate`](Self::allocate).
    /// - A `new_size` of zero returns `Ok(None)`. The object is not freed; it
    ///   goes away in a later collection once nothing references it.
    /// - A pointer that is not the start of a live payload is treated as a
    ///   fresh allocation, nothing is copied.
    /// - If the current capacity already fits, the same pointer comes back.
    /// - Otherwise a new object is allocated and the old contents copied
    ///   over. The old object becomes garbage.
    ///
    /// # Errors
    ///
    /// Fails as [`allocate`](Self::allocate) when a new object is needed.
    pub fn resize(
        &mut self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let Some(ptr) = ptr else {
            return self.allocate(new_size).map(Some);
        };
        if new_size == 0 {
            return Ok(None);
        }

        let Some(object) = self.objects.find_payload(ptr.as_ptr() as usize) else {
            trace::log_resize_unknown(ptr.as_ptr() as usize);
            return self.allocate(new_size).map(Some);
        };

        let old_size = object.size();
        let aligned = align_up(new_size).ok_or(AllocError::OutOfMemory {
            requested: new_size,
        })?;
        if aligned <= old_size {
            return Ok(Some(ptr));
        }

        // `ptr` stays live across the allocation, which keeps the old object
        // rooted should it collect.
        let new_ptr = self.allocate(new_size)?;
        // SAFETY: both payloads are live and distinct, and `old_size < new_size`.
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size.min(new_size));
        }
        std::hint::black_box(ptr);
        Ok(Some(new_ptr))
    }

    /// Does nothing: memory is reclaimed by reachability only.
    #[allow(clippy::unused_self)]
    pub const fn deallocate(&self, _ptr: Option<NonNull<u8>>) {}

    /// Runs a full collection now, regardless of usage.
    pub fn collect(&mut self) {
        self.collect_with(CollectionTrigger::Forced);
    }

    #[inline(never)]
    fn collect_with(&mut self, trigger: CollectionTrigger) {
        let bottom = self.stack_bottom;
        self.run_collection(trigger, |registers, marker| {
            roots::scan_roots(bottom, registers, |word| marker.add_root(word)).roots
        });
    }

    /// Marks from exactly the given words instead of the stack and registers.
    ///
    /// Meant for tests that need a collection independent of whatever the
    /// compiler left on the stack.
    #[cfg(any(test, feature = "test-util"))]
    pub fn collect_from_roots(&mut self, roots: &[usize]) {
        self.run_collection(CollectionTrigger::Forced, |_, marker| {
            roots.iter().filter(|&&word| marker.add_root(word)).count()
        });
    }

    fn run_collection<F>(&mut self, trigger: CollectionTrigger, find_roots: F)
    where
        F: FnOnce(&mut RegisterSnapshot, &mut Marker<'_>) -> usize,
    {
        let gc_id = next_gc_id();
        let _span = trace::trace_gc_collection(trigger, gc_id);
        let mut timer = PhaseTimer::start();

        let (roots_found, objects_marked) = {
            let _phase = trace::trace_phase(GcPhase::Mark);
            let mut marker = Marker::new(&self.arena, &self.objects);
            let roots_found = find_roots(&mut self.registers, &mut marker);
            marker.drain();
            (roots_found, marker.marked())
        };
        timer.end_mark();

        let swept = {
            let _phase = trace::trace_phase(GcPhase::Sweep);
            gc::sweep(&mut self.arena, &mut self.objects, &mut self.free)
        };
        timer.end_sweep();

        self.collections += 1;
        self.last_metrics = GcMetrics {
            duration: timer.total(),
            mark_duration: timer.mark,
            sweep_duration: timer.sweep,
            objects_marked,
            roots_found,
            bytes_reclaimed: swept.bytes_reclaimed,
            bytes_surviving: swept.bytes_surviving,
            objects_reclaimed: swept.objects_reclaimed,
            objects_surviving: swept.objects_surviving,
            blocks_coalesced: swept.blocks_coalesced,
            trigger,
            total_collections: self.collections,
        };
        trace::log_collection(&self.last_metrics);

        #[cfg(feature = "paranoid-sweep")]
        if let Err(violation) = self.verify() {
            panic!("heap corrupted after collection {}: {violation}", self.collections);
        }
    }

    /// Current heap statistics.
    #[must_use]
    pub fn stats(&self) -> GcStats {
        GcStats {
            arena_size: self.arena.size(),
            bytes_in_use: self.arena.used(),
            live_objects: self.objects.len(),
            free_blocks: self.free.len(),
            free_bytes: self.free.free_bytes(),
            collections: self.collections,
            allocations: self.allocations,
        }
    }

    /// Results of the most recent collection.
    #[must_use]
    pub const fn metrics(&self) -> GcMetrics {
        self.last_metrics
    }

    /// Bytes held by live objects, headers included.
    #[must_use]
    pub const fn bytes_in_use(&self) -> usize {
        self.arena.used()
    }

    /// Whether `ptr` points into this collector's arena.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.arena.contains(ptr as usize)
    }

    /// Capacity of the live object whose payload starts at `ptr`.
    #[must_use]
    pub fn payload_size(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.objects
            .find_payload(ptr.as_ptr() as usize)
            .map(Object::size)
    }

    /// Payload address ranges of all live objects, newest first.
    pub fn live_ranges(&self) -> impl Iterator<Item = std::ops::Range<usize>> + '_ {
        self.objects.iter().map(Object::payload_range)
    }

    /// `(address, size)` of every free span, in address order.
    pub fn free_spans(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.free.iter()
    }

    /// Checks the heap invariants.
    ///
    /// # Errors
    ///
    /// Returns the first broken invariant.
    pub fn verify(&self) -> Result<(), HeapViolation> {
        gc::verify_heap(&self.arena, &self.objects, &self.free)
    }

    /// The configuration this collector was created with.
    #[must_use]
    pub const fn config(&self) -> &GcConfig {
        &self.config
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        trace::log_final_stats(&self.stats());
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("arena", &self.arena)
            .field("stack_bottom", &self.stack_bottom)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
