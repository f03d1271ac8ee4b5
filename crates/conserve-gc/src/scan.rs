//! Conservative scanning of raw memory regions.
//!
//! This is the only module that reinterprets memory as address-sized words.
//! Stack ranges, the register snapshot and object payloads all go through
//! [`scan_words`].

use std::ops::Range;

/// Size of the words the scanner reads.
pub const WORD: usize = std::mem::size_of::<usize>();

/// Whether `word` is a candidate root for a heap spanning `heap`.
///
/// A candidate is pointer aligned and falls inside the heap's address range.
/// Nothing else is known about it: an integer with the right bit pattern is
/// indistinguishable from a pointer.
#[inline]
#[must_use]
pub fn is_candidate(word: usize, heap: &Range<usize>) -> bool {
    word % WORD == 0 && heap.contains(&word)
}

/// Visit every pointer-aligned word in `[start, start + len)`.
///
/// # Safety
///
/// The whole region must be readable for the duration of the call.
pub unsafe fn scan_words<F>(start: usize, len: usize, mut visit: F)
where
    F: FnMut(usize),
{
    if start == 0 || len == 0 {
        return;
    }

    let end = start.saturating_add(len);
    let mut current = start.next_multiple_of(WORD);

    while current + WORD <= end {
        // SAFETY: the caller guarantees the region is readable; `current` is aligned.
        // Volatile keeps the compiler from reasoning about stack slots it thinks are dead.
        let word = unsafe { std::ptr::read_volatile(current as *const usize) };
        visit(word);
        current += WORD;
    }
}

/// Visit every pointer-aligned word between two addresses, whichever is lower.
///
/// Stacks grow down on the usual targets and up on a few; the range is
/// normalized so the scan always walks upward.
///
/// # Safety
///
/// Every byte between `a` and `b` must be readable.
pub unsafe fn scan_between<F>(a: usize, b: usize, visit: F)
where
    F: FnMut(usize),
{
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    unsafe { scan_words(start, end - start, visit) };
}
