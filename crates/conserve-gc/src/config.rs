//! Collector configuration and the collection trigger.

use crate::error::GcError;
use crate::heap::{ALIGNMENT, HEADER_SIZE};

/// Default arena size: 1 MiB.
pub const DEFAULT_ARENA_SIZE: usize = 1024 * 1024;

/// Default collection threshold, as a fraction of the arena.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Decides whether an allocation should run a collection first.
pub type CollectCondition = fn(&CollectInfo) -> bool;

/// Heap state handed to a [`CollectCondition`].
#[derive(Debug, Clone, Copy)]
pub struct CollectInfo {
    arena_size: usize,
    bytes_in_use: usize,
    requested_span: usize,
    threshold: f64,
}

impl CollectInfo {
    /// Describes a pending allocation of `requested_span` bytes.
    ///
    /// The collector builds one of these before every allocation; custom
    /// conditions can be exercised with hand-made ones.
    #[must_use]
    pub const fn new(
        arena_size: usize,
        bytes_in_use: usize,
        requested_span: usize,
        threshold: f64,
    ) -> Self {
        Self {
            arena_size,
            bytes_in_use,
            requested_span,
            threshold,
        }
    }

    /// Total arena size in bytes.
    #[must_use]
    pub const fn arena_size(&self) -> usize {
        self.arena_size
    }

    /// Bytes held by live objects before this allocation.
    #[must_use]
    pub const fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    /// Header plus aligned payload of the pending allocation.
    #[must_use]
    pub const fn requested_span(&self) -> usize {
        self.requested_span
    }

    /// Usage after the pending allocation succeeds.
    #[must_use]
    pub const fn projected_usage(&self) -> usize {
        self.bytes_in_use.saturating_add(self.requested_span)
    }

    /// Configured threshold fraction.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Collect when projected usage would exceed `threshold * arena_size`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_collect_condition(info: &CollectInfo) -> bool {
    info.projected_usage() as f64 > info.arena_size as f64 * info.threshold
}

/// Collector configuration.
///
/// # Example
///
/// ```
/// use conserve_gc::GcConfig;
///
/// let config = GcConfig::new().arena_size(256 * 1024).threshold(0.5);
/// assert_eq!(config.get_arena_size(), 256 * 1024);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    arena_size: usize,
    threshold: f64,
    collect_condition: CollectCondition,
}

impl GcConfig {
    /// 1 MiB arena, collection at 80% usage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            arena_size: DEFAULT_ARENA_SIZE,
            threshold: DEFAULT_THRESHOLD,
            collect_condition: default_collect_condition,
        }
    }

    /// Sets the arena size in bytes.
    #[must_use]
    pub const fn arena_size(mut self, size: usize) -> Self {
        self.arena_size = size;
        self
    }

    /// Sets the usage fraction above which allocations collect first.
    #[must_use]
    pub const fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replaces the collection trigger.
    #[must_use]
    pub const fn collect_condition(mut self, condition: CollectCondition) -> Self {
        self.collect_condition = condition;
        self
    }

    /// Configured arena size.
    #[must_use]
    pub const fn get_arena_size(&self) -> usize {
        self.arena_size
    }

    /// Configured threshold.
    #[must_use]
    pub const fn get_threshold(&self) -> f64 {
        self.threshold
    }

    pub(crate) const fn condition(&self) -> CollectCondition {
        self.collect_condition
    }

    pub(crate) fn validate(&self) -> Result<(), GcError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(GcError::InvalidConfig("threshold must be in (0, 1]"));
        }
        if self.arena_size < HEADER_SIZE + ALIGNMENT {
            return Err(GcError::InvalidConfig(
                "arena must hold at least one object header and payload",
            ));
        }
        if self.arena_size % ALIGNMENT != 0 {
            return Err(GcError::InvalidConfig("arena size must be a multiple of 8"));
        }
        Ok(())
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self::new()
    }
}
