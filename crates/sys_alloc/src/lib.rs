//! Anonymous memory mappings for garbage collector arenas.
//!
//! The collector obtains its whole backing store once, as a single private
//! read/write mapping, and gives it back to the operating system when the
//! owning [`Mmap`] is dropped.

use std::io;
use std::ops::Range;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as os;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as os;

pub use os::page_size;

/// An owned, anonymous, read/write memory mapping.
///
/// The region is unmapped when this handle is dropped.
pub struct Mmap {
    inner: os::MmapInner,
}

impl Mmap {
    /// Maps `len` bytes of zeroed anonymous memory.
    ///
    /// # Errors
    ///
    /// Returns the operating system error if the mapping is refused, or
    /// `InvalidInput` when `len` is zero.
    pub fn anonymous(len: usize) -> io::Result<Self> {
        MmapOptions::new().len(len).map_anon()
    }

    /// Returns a pointer to the start of the mapping.
    #[must_use]
    pub fn ptr(&self) -> *mut u8 {
        self.inner.ptr()
    }

    /// Returns the length of the mapping in bytes, as requested.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// A mapping is never empty; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Address range `[start, end)` covered by the mapping.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        let start = self.ptr() as usize;
        start..start + self.len()
    }

    /// Whether `addr` falls inside the mapping.
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        self.range().contains(&addr)
    }
}

impl std::fmt::Debug for Mmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mmap")
            .field("ptr", &self.ptr())
            .field("len", &self.len())
            .finish()
    }
}

/// Configuration for creating an anonymous mapping.
#[derive(Debug, Clone, Default)]
pub struct MmapOptions {
    len: usize,
    populate: bool,
}

impl MmapOptions {
    /// Creates options with a length of zero; set a length before mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            len: 0,
            populate: false,
        }
    }

    /// Sets the length of the mapping in bytes.
    #[must_use]
    pub const fn len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    /// Prefault the page tables (`MAP_POPULATE` on Linux, ignored elsewhere).
    #[must_use]
    pub const fn populate(mut self, populate: bool) -> Self {
        self.populate = populate;
        self
    }

    /// Creates the mapping.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a zero length, otherwise the error reported
    /// by the operating system.
    pub fn map_anon(&self) -> io::Result<Mmap> {
        if self.len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "length must be greater than 0",
            ));
        }

        // SAFETY: a fresh anonymous mapping aliases no existing memory.
        let inner = unsafe { os::MmapInner::map_anon(self.len, self.populate)? };
        Ok(Mmap { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_page_size() {
        let ps = page_size();
        assert!(ps > 0);
        assert_eq!(ps & (ps - 1), 0, "Page size should be power of 2");
    }

    #[test]
    fn test_zero_length_rejected() {
        let err = Mmap::anonymous(0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_anonymous_is_zeroed_and_writable() {
        let len = page_size() * 2;
        let mmap = Mmap::anonymous(len).expect("failed to map");

        let base = mmap.ptr();
        assert!(!base.is_null());
        assert_eq!(base as usize % page_size(), 0);
        assert_eq!(mmap.len(), len);

        unsafe {
            assert_eq!(ptr::read_volatile(base.add(len - 1)), 0);
            ptr::write_volatile(base.add(17), 42);
            assert_eq!(ptr::read_volatile(base.add(17)), 42);
        }
    }

    #[test]
    fn test_contains_is_half_open() {
        let mmap = Mmap::anonymous(page_size()).expect("failed to map");
        let range = mmap.range();
        assert!(mmap.contains(range.start));
        assert!(mmap.contains(range.end - 1));
        assert!(!mmap.contains(range.end));
        assert!(!mmap.contains(range.start.wrapping_sub(1)));
    }

    #[test]
    fn test_populate_option() {
        let mmap = MmapOptions::new()
            .len(page_size())
            .populate(true)
            .map_anon()
            .expect("failed to map");
        unsafe {
            ptr::write_volatile(mmap.ptr(), 7);
            assert_eq!(ptr::read_volatile(mmap.ptr()), 7);
        }
    }
}
