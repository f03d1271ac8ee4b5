//! GC metrics and statistics.

use std::fmt;
use std::time::{Duration, Instant};

/// Why a collection ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CollectionTrigger {
    /// No collection has run yet.
    #[default]
    None = 0,
    /// An allocation would have pushed usage past the threshold.
    Threshold = 1,
    /// The free list had no span large enough for an allocation.
    AllocationFailure = 2,
    /// Requested explicitly.
    Forced = 3,
}

/// Statistics from the most recent garbage collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcMetrics {
    /// Duration of the whole collection.
    pub duration: Duration,
    /// Duration of root scanning and marking.
    pub mark_duration: Duration,
    /// Duration of the sweep, coalescing included.
    pub sweep_duration: Duration,
    /// Number of objects found reachable.
    pub objects_marked: usize,
    /// Number of candidate roots found on the stack and in registers.
    pub roots_found: usize,
    /// Bytes returned to the free list.
    pub bytes_reclaimed: usize,
    /// Bytes still held by live objects.
    pub bytes_surviving: usize,
    /// Number of objects reclaimed.
    pub objects_reclaimed: usize,
    /// Number of objects surviving.
    pub objects_surviving: usize,
    /// Free spans merged while coalescing.
    pub blocks_coalesced: usize,
    /// What started the collection.
    pub trigger: CollectionTrigger,
    /// Collections run by this collector so far, this one included.
    pub total_collections: usize,
}

/// Times the mark and sweep phases of one collection.
#[derive(Debug, Clone, Copy)]
pub struct PhaseTimer {
    started: Instant,
    phase_start: Instant,
    /// Time spent marking.
    pub mark: Duration,
    /// Time spent sweeping.
    pub sweep: Duration,
}

impl PhaseTimer {
    /// Starts the timer at the beginning of the mark phase.
    #[must_use]
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            phase_start: now,
            mark: Duration::ZERO,
            sweep: Duration::ZERO,
        }
    }

    /// Ends the mark phase and starts the sweep phase.
    pub fn end_mark(&mut self) {
        let now = Instant::now();
        self.mark = now - self.phase_start;
        self.phase_start = now;
    }

    /// Ends the sweep phase.
    pub fn end_sweep(&mut self) {
        self.sweep = self.phase_start.elapsed();
    }

    /// Time since [`start`](Self::start).
    #[must_use]
    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Snapshot of the collector's state, as reported by `stats()`.
///
/// The `Display` form is a human-readable dump meant for diagnostics, not
/// for parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Arena size in bytes.
    pub arena_size: usize,
    /// Bytes held by live objects, headers included.
    pub bytes_in_use: usize,
    /// Number of live objects.
    pub live_objects: usize,
    /// Number of spans on the free list.
    pub free_blocks: usize,
    /// Total bytes on the free list.
    pub free_bytes: usize,
    /// Collections run so far.
    pub collections: usize,
    /// Successful allocations so far.
    pub allocations: usize,
}

impl GcStats {
    /// Share of the arena held by live objects, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usage_percent(&self) -> f64 {
        if self.arena_size == 0 {
            return 0.0;
        }
        self.bytes_in_use as f64 / self.arena_size as f64 * 100.0
    }
}

impl fmt::Display for GcStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GC Stats:")?;
        writeln!(f, "  Heap size: {} bytes", self.arena_size)?;
        writeln!(
            f,
            "  Heap used: {} bytes ({:.1}%)",
            self.bytes_in_use,
            self.usage_percent()
        )?;
        writeln!(f, "  Objects: {}", self.live_objects)?;
        writeln!(
            f,
            "  Free blocks: {} ({} bytes)",
            self.free_blocks, self.free_bytes
        )?;
        writeln!(f, "  Collections: {}", self.collections)?;
        write!(f, "  Allocations: {}", self.allocations)
    }
}
