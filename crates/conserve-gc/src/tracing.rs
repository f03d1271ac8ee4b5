//! GC tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for allocation and collection. Without it every
//! entry point compiles to nothing.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level};

    use crate::metrics::{CollectionTrigger, GcMetrics, GcStats};

    /// High-level GC phases.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GcPhase {
        /// Scan roots and trace the object graph.
        Mark,
        /// Reclaim unmarked objects and coalesce free spans.
        Sweep,
    }

    /// Stable identifier for a GC run.
    ///
    /// Correlates every event of one collection. Starts at 1 and increases
    /// monotonically across all collectors in the process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Global counter for generating unique GC IDs.
    static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique GC ID.
    pub fn next_gc_id() -> GcId {
        GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a span for the entire GC collection.
    pub fn trace_gc_collection(trigger: CollectionTrigger, gc_id: GcId) -> span::EnteredSpan {
        span!(Level::DEBUG, "gc_collect", trigger = ?trigger, gc_id = gc_id.0).entered()
    }

    /// Create a span for a GC phase.
    pub fn trace_phase(phase: GcPhase) -> span::EnteredSpan {
        span!(Level::DEBUG, "gc_phase", phase = ?phase).entered()
    }

    pub fn log_arena_mapped(base: usize, size: usize) {
        tracing::debug!(base = format_args!("{base:#x}"), size, "arena_mapped");
    }

    pub fn log_roots_scanned(stack_words: usize, register_words: usize, roots: usize) {
        tracing::trace!(stack_words, register_words, roots, "roots_scanned");
    }

    pub fn log_coalesced(merged: usize, free_blocks: usize) {
        tracing::trace!(merged, free_blocks, "free_list_coalesced");
    }

    pub fn log_collection(metrics: &GcMetrics) {
        tracing::debug!(
            objects_marked = metrics.objects_marked,
            objects_reclaimed = metrics.objects_reclaimed,
            bytes_reclaimed = metrics.bytes_reclaimed,
            bytes_surviving = metrics.bytes_surviving,
            duration_us = u64::try_from(metrics.duration.as_micros()).unwrap_or(u64::MAX),
            "collection_complete"
        );
    }

    pub fn log_threshold_exceeded(bytes_in_use: usize, requested_span: usize) {
        tracing::debug!(bytes_in_use, requested_span, "threshold_exceeded");
    }

    pub fn log_out_of_memory(requested: usize, largest_free: usize) {
        tracing::warn!(requested, largest_free, "out_of_memory");
    }

    pub fn log_resize_unknown(addr: usize) {
        tracing::debug!(addr = format_args!("{addr:#x}"), "resize_of_unknown_pointer");
    }

    pub fn log_init_failed(err: &crate::error::GcError) {
        tracing::error!(error = %err, "collector_init_failed");
    }

    pub fn log_final_stats(stats: &GcStats) {
        tracing::info!(
            collections = stats.collections,
            allocations = stats.allocations,
            bytes_in_use = stats.bytes_in_use,
            live_objects = stats.live_objects,
            "collector_shutdown"
        );
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    use crate::metrics::{CollectionTrigger, GcMetrics, GcStats};

    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Stub phase when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GcPhase {
        Mark,
        Sweep,
    }

    /// Stub function when tracing is disabled.
    pub const fn next_gc_id() -> GcId {
        GcId(0)
    }

    pub const fn trace_gc_collection(_trigger: CollectionTrigger, _gc_id: GcId) {}
    pub const fn trace_phase(_phase: GcPhase) {}
    pub const fn log_arena_mapped(_base: usize, _size: usize) {}
    pub const fn log_roots_scanned(_stack_words: usize, _register_words: usize, _roots: usize) {}
    pub const fn log_coalesced(_merged: usize, _free_blocks: usize) {}
    pub const fn log_collection(_metrics: &GcMetrics) {}
    pub const fn log_threshold_exceeded(_bytes_in_use: usize, _requested_span: usize) {}
    pub const fn log_out_of_memory(_requested: usize, _largest_free: usize) {}
    pub const fn log_resize_unknown(_addr: usize) {}
    pub const fn log_init_failed(_err: &crate::error::GcError) {}
    pub const fn log_final_stats(_stats: &GcStats) {}
}

pub use internal::GcId;
