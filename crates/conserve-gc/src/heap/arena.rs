use std::ops::Range;
use std::ptr::NonNull;

use sys_alloc::Mmap;

use crate::error::GcError;
use crate::scan;

/// The single contiguous region backing every managed allocation.
///
/// Mapped once and released when dropped. `used` counts the bytes held by
/// live objects, headers included.
#[derive(Debug)]
pub struct Arena {
    map: Mmap,
    used: usize,
}

impl Arena {
    /// Maps a fresh, zeroed arena of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::ArenaMap`] if the operating system refuses the mapping.
    pub fn map(size: usize) -> Result<Self, GcError> {
        let map = Mmap::anonymous(size).map_err(|source| GcError::ArenaMap { size, source })?;
        Ok(Self { map, used: 0 })
    }

    /// First byte of the arena.
    #[must_use]
    pub fn base(&self) -> NonNull<u8> {
        // SAFETY: a successful mapping is never null.
        unsafe { NonNull::new_unchecked(self.map.ptr()) }
    }

    /// Total size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Bytes held by live objects (header plus payload).
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Address range `[base, base + size)`.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.map.range()
    }

    /// Whether `addr` lies inside the arena.
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        self.map.contains(addr)
    }

    /// Whether `word` is a candidate root for this arena.
    #[must_use]
    pub fn is_candidate(&self, word: usize) -> bool {
        scan::is_candidate(word, &self.range())
    }

    pub(crate) const fn charge(&mut self, span: usize) {
        self.used += span;
    }

    pub(crate) fn credit(&mut self, span: usize) {
        debug_assert!(span <= self.used, "arena usage underflow");
        self.used -= span;
    }
}
