//! Arena memory management internals.
//!
//! The collector carves everything out of one [`Arena`]: live objects are
//! tracked by the [`Registry`], the gaps between them by the [`FreeList`].
//! Both keep their bookkeeping in-place, inside the arena.
//!
//! This module is public for testing and advanced use cases.
//! Most users should go through [`Collector`](crate::Collector).

mod arena;
mod free_list;
mod object;

pub use arena::Arena;
pub use free_list::{FreeBlock, FreeList, FreeSpans, MIN_FREE_BLOCK};
pub use object::{Object, ObjectHeader, Objects, Registry, HEADER_SIZE};

// ============================================================================
// Constants
// ============================================================================

/// Allocation granularity. Payload sizes, spans and block addresses are all
/// multiples of this.
pub const ALIGNMENT: usize = 8;

/// Round `size` up to [`ALIGNMENT`], or `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(size: usize) -> Option<usize> {
    match size.checked_add(ALIGNMENT - 1) {
        Some(padded) => Some(padded & !(ALIGNMENT - 1)),
        None => None,
    }
}
