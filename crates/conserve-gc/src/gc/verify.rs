//! Heap invariant checking.

use std::fmt;

use crate::heap::{Arena, FreeList, Registry};

/// A broken heap invariant, found by [`verify_heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapViolation {
    /// A span lies partly or wholly outside the arena.
    OutOfArena {
        /// Start of the offending span.
        addr: usize,
    },
    /// Two spans (objects or free blocks) share bytes.
    Overlap {
        /// Start of the lower span.
        first: usize,
        /// Start of the span that begins inside it.
        second: usize,
    },
    /// Objects and free spans do not cover the whole arena.
    Unaccounted {
        /// Bytes covered by objects and free spans.
        covered: usize,
        /// Arena size.
        arena_size: usize,
    },
    /// The free list is not in strictly ascending address order.
    FreeListUnsorted {
        /// Span found out of order.
        addr: usize,
    },
    /// Two free spans abut and should have been merged.
    AdjacentFreeBlocks {
        /// Start of the lower span.
        addr: usize,
    },
    /// `bytes in use` differs from the sum of live object spans.
    UsageMismatch {
        /// Usage counter.
        recorded: usize,
        /// Sum of header plus payload over live objects.
        actual: usize,
    },
    /// An object still carries a mark outside a collection.
    StrayMark {
        /// Payload address of the object.
        addr: usize,
    },
}

impl fmt::Display for HeapViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfArena { addr } => write!(f, "span at {addr:#x} escapes the arena"),
            Self::Overlap { first, second } => {
                write!(f, "span at {second:#x} overlaps span at {first:#x}")
            }
            Self::Unaccounted {
                covered,
                arena_size,
            } => write!(f, "only {covered} of {arena_size} arena bytes accounted for"),
            Self::FreeListUnsorted { addr } => {
                write!(f, "free span at {addr:#x} is out of address order")
            }
            Self::AdjacentFreeBlocks { addr } => {
                write!(f, "free span at {addr:#x} abuts its successor")
            }
            Self::UsageMismatch { recorded, actual } => {
                write!(f, "usage counter is {recorded} but live objects hold {actual}")
            }
            Self::StrayMark { addr } => write!(f, "object at {addr:#x} is still marked"),
        }
    }
}

impl std::error::Error for HeapViolation {}

/// Check the invariants that hold between any two collector operations.
///
/// # Errors
///
/// Returns the first violation found.
pub fn verify_heap(
    arena: &Arena,
    registry: &Registry,
    free: &FreeList,
) -> Result<(), HeapViolation> {
    let bounds = arena.range();

    let mut previous: Option<(usize, usize)> = None;
    for (addr, size) in free.iter() {
        if let Some((prev_addr, prev_size)) = previous {
            if addr <= prev_addr {
                return Err(HeapViolation::FreeListUnsorted { addr });
            }
            if prev_addr + prev_size == addr {
                return Err(HeapViolation::AdjacentFreeBlocks { addr: prev_addr });
            }
        }
        previous = Some((addr, size));
    }

    let mut actual = 0;
    for object in registry.iter() {
        actual += object.span();
        if object.is_marked() {
            return Err(HeapViolation::StrayMark {
                addr: object.payload().as_ptr() as usize,
            });
        }
    }
    if actual != arena.used() {
        return Err(HeapViolation::UsageMismatch {
            recorded: arena.used(),
            actual,
        });
    }

    let mut spans: Vec<(usize, usize)> = registry
        .iter()
        .map(|object| (object.header().as_ptr() as usize, object.span()))
        .chain(free.iter())
        .collect();
    spans.sort_unstable();

    let mut covered = 0;
    let mut end_of_previous: Option<(usize, usize)> = None;
    for &(addr, size) in &spans {
        if addr < bounds.start || addr + size > bounds.end {
            return Err(HeapViolation::OutOfArena { addr });
        }
        if let Some((prev_addr, prev_end)) = end_of_previous {
            if addr < prev_end {
                return Err(HeapViolation::Overlap {
                    first: prev_addr,
                    second: addr,
                });
            }
        }
        end_of_previous = Some((addr, addr + size));
        covered += size;
    }
    if covered != arena.size() {
        return Err(HeapViolation::Unaccounted {
            covered,
            arena_size: arena.size(),
        });
    }

    Ok(())
}
