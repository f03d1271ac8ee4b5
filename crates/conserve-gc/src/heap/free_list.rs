//! Address-ordered free list with splitting and coalescing.
//!
//! Free spans carry their own bookkeeping: a [`FreeBlock`] header is written
//! at the start of every span on the list.

use std::ptr::{self, NonNull};

use super::ALIGNMENT;

/// Header stored in-place at the start of a free span.
#[repr(C)]
#[derive(Debug)]
pub struct FreeBlock {
    /// Size of the whole span, header included.
    pub size: usize,
    /// Next free span at a higher address.
    pub next: *mut FreeBlock,
}

/// Smallest span that can be put on the free list.
pub const MIN_FREE_BLOCK: usize = std::mem::size_of::<FreeBlock>();

/// A block is split only if the remainder still holds a header plus slack.
const SPLIT_THRESHOLD: usize = MIN_FREE_BLOCK + ALIGNMENT;

/// Singly-linked list of free spans, sorted by ascending address.
///
/// Invariants: no two spans overlap, every span is at least
/// [`MIN_FREE_BLOCK`] bytes, and after [`coalesce`](Self::coalesce) no span
/// ends where the next one begins.
#[derive(Debug)]
pub struct FreeList {
    head: *mut FreeBlock,
}

impl FreeList {
    /// A list with no free spans.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            head: ptr::null_mut(),
        }
    }

    /// A list holding the whole of `[base, base + len)` as one span.
    ///
    /// # Safety
    ///
    /// The region must be writable, `ALIGNMENT`-aligned, unused by anything
    /// else, and at least [`MIN_FREE_BLOCK`] bytes long.
    #[must_use]
    pub unsafe fn from_region(base: NonNull<u8>, len: usize) -> Self {
        debug_assert!(len >= MIN_FREE_BLOCK);
        let block = base.as_ptr().cast::<FreeBlock>();
        unsafe {
            block.write(FreeBlock {
                size: len,
                next: ptr::null_mut(),
            });
        }
        Self { head: block }
    }

    /// Take `size` bytes from the first span large enough to hold them.
    ///
    /// Returns the start of the granted span and its length. The length is
    /// `size` when the span was split, or the span's full size when the
    /// remainder would have been too small to stand on its own.
    pub fn acquire(&mut self, size: usize) -> Option<(NonNull<u8>, usize)> {
        debug_assert_eq!(size % ALIGNMENT, 0, "unaligned request");
        let mut link: *mut *mut FreeBlock = &raw mut self.head;

        // SAFETY: every node on the list is a valid FreeBlock inside the arena.
        unsafe {
            while !(*link).is_null() {
                let block = *link;
                let block_size = (*block).size;

                if block_size >= size {
                    let granted = if block_size >= size + SPLIT_THRESHOLD {
                        let rest = block.cast::<u8>().add(size).cast::<FreeBlock>();
                        rest.write(FreeBlock {
                            size: block_size - size,
                            next: (*block).next,
                        });
                        *link = rest;
                        size
                    } else {
                        *link = (*block).next;
                        block_size
                    };
                    return Some((NonNull::new_unchecked(block.cast::<u8>()), granted));
                }

                link = &raw mut (*block).next;
            }
        }

        None
    }

    /// Return a span to the list, keeping it sorted by address.
    ///
    /// Spans shorter than [`MIN_FREE_BLOCK`] cannot carry a header; they are
    /// dropped and stay unusable. Returns whether the span was stored.
    ///
    /// # Safety
    ///
    /// `[ptr, ptr + size)` must be writable, `ALIGNMENT`-aligned, and overlap
    /// neither a live object nor a span already on the list.
    pub unsafe fn release(&mut self, ptr: NonNull<u8>, size: usize) -> bool {
        if size < MIN_FREE_BLOCK {
            return false;
        }

        let block = ptr.as_ptr().cast::<FreeBlock>();
        let mut link: *mut *mut FreeBlock = &raw mut self.head;

        unsafe {
            while !(*link).is_null() && (*link) < block {
                link = &raw mut (**link).next;
            }
            block.write(FreeBlock { size, next: *link });
            *link = block;
        }

        true
    }

    /// Merge every run of adjacent spans into a single span.
    ///
    /// One pass from low to high addresses; a merged span is re-checked
    /// against its new neighbour, so runs of any length collapse. Returns
    /// the number of merges.
    pub fn coalesce(&mut self) -> usize {
        let mut merged = 0;
        let mut current = self.head;

        // SAFETY: list nodes are valid FreeBlocks; merged nodes are only unlinked.
        unsafe {
            while !current.is_null() && !(*current).next.is_null() {
                let next = (*current).next;
                if current.cast::<u8>().add((*current).size) == next.cast::<u8>() {
                    (*current).size += (*next).size;
                    (*current).next = (*next).next;
                    merged += 1;
                } else {
                    current = next;
                }
            }
        }

        merged
    }

    /// Iterate over `(address, size)` of each free span in address order.
    #[must_use]
    pub const fn iter(&self) -> FreeSpans<'_> {
        FreeSpans {
            current: self.head,
            _list: std::marker::PhantomData,
        }
    }

    /// Number of spans on the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether the list holds no span.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Sum of the sizes of all spans.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.iter().map(|(_, size)| size).sum()
    }

    /// Size of the largest span, or 0 if the list is empty.
    #[must_use]
    pub fn largest(&self) -> usize {
        self.iter().map(|(_, size)| size).max().unwrap_or(0)
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::empty()
    }
}

/// Iterator over the spans of a [`FreeList`].
pub struct FreeSpans<'a> {
    current: *mut FreeBlock,
    _list: std::marker::PhantomData<&'a FreeList>,
}

impl Iterator for FreeSpans<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }
        // SAFETY: the borrowed list keeps its nodes valid.
        let block = unsafe { &*self.current };
        let item = (self.current as usize, block.size);
        self.current = block.next;
        Some(item)
    }
}
