//! Object headers and the registry of live objects.
//!
//! Every allocation is laid out as an [`ObjectHeader`] immediately followed
//! by its payload. Callers only ever see the payload address; the header is
//! owned by the [`Registry`].

use std::ops::Range;
use std::ptr::{self, NonNull};

use super::ALIGNMENT;

/// Metadata stored directly in front of each payload.
#[repr(C)]
#[derive(Debug)]
pub struct ObjectHeader {
    /// Payload capacity in bytes.
    pub size: usize,
    /// Set while the object is known reachable during a collection.
    pub marked: bool,
    /// Next object in the registry.
    pub next: *mut ObjectHeader,
}

/// Header size rounded up so that payloads stay `ALIGNMENT`-aligned.
pub const HEADER_SIZE: usize =
    std::mem::size_of::<ObjectHeader>().next_multiple_of(ALIGNMENT);

/// A live allocation: a header view and a payload view over one span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Object {
    header: NonNull<ObjectHeader>,
}

impl Object {
    /// Write a fresh header at `span` and zero the payload that follows it.
    ///
    /// # Safety
    ///
    /// `span` must be writable for `HEADER_SIZE + payload_size` bytes and
    /// suitably aligned for an [`ObjectHeader`].
    pub unsafe fn init(span: NonNull<u8>, payload_size: usize) -> Self {
        let header = span.cast::<ObjectHeader>();
        unsafe {
            header.as_ptr().write(ObjectHeader {
                size: payload_size,
                marked: false,
                next: ptr::null_mut(),
            });
            ptr::write_bytes(span.as_ptr().add(HEADER_SIZE), 0, payload_size);
        }
        Self { header }
    }

    /// Wrap an existing header.
    ///
    /// # Safety
    ///
    /// `header` must point at a header written by [`Object::init`].
    pub const unsafe fn from_header(header: NonNull<ObjectHeader>) -> Self {
        Self { header }
    }

    /// The header view.
    #[must_use]
    pub const fn header(self) -> NonNull<ObjectHeader> {
        self.header
    }

    /// The payload view, as handed to callers.
    #[must_use]
    pub fn payload(self) -> NonNull<u8> {
        // SAFETY: the payload directly follows the header in the same span.
        unsafe { self.header.cast::<u8>().add(HEADER_SIZE) }
    }

    /// Payload capacity in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        unsafe { (*self.header.as_ptr()).size }
    }

    /// Header plus payload: the bytes this object occupies in the arena.
    #[must_use]
    pub fn span(self) -> usize {
        HEADER_SIZE + self.size()
    }

    /// Addresses covered by the payload, `[data, data + size)`.
    #[must_use]
    pub fn payload_range(self) -> Range<usize> {
        let start = self.payload().as_ptr() as usize;
        start..start + self.size()
    }

    /// Whether `addr` points into the payload.
    #[must_use]
    pub fn contains(self, addr: usize) -> bool {
        self.payload_range().contains(&addr)
    }

    /// Whether the mark flag is set.
    #[must_use]
    pub fn is_marked(self) -> bool {
        unsafe { (*self.header.as_ptr()).marked }
    }

    /// Set or clear the mark flag.
    pub fn set_marked(self, marked: bool) {
        unsafe { (*self.header.as_ptr()).marked = marked };
    }

    fn next(self) -> *mut ObjectHeader {
        unsafe { (*self.header.as_ptr()).next }
    }

    fn set_next(self, next: *mut ObjectHeader) {
        unsafe { (*self.header.as_ptr()).next = next };
    }
}

/// Singly-linked list of every live object, newest first.
#[derive(Debug)]
pub struct Registry {
    head: *mut ObjectHeader,
    len: usize,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            len: 0,
        }
    }

    /// Link a freshly initialized object at the head.
    pub fn push(&mut self, object: Object) {
        object.set_next(self.head);
        self.head = object.header().as_ptr();
        self.len += 1;
    }

    /// Number of live objects.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no object is live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the live objects, newest first.
    #[must_use]
    pub const fn iter(&self) -> Objects<'_> {
        Objects {
            current: self.head,
            _registry: std::marker::PhantomData,
        }
    }

    /// The object whose payload contains `addr`, if any.
    ///
    /// Linear in the number of live objects.
    #[must_use]
    pub fn find_containing(&self, addr: usize) -> Option<Object> {
        self.iter().find(|object| object.contains(addr))
    }

    /// The object whose payload starts exactly at `addr`, if any.
    #[must_use]
    pub fn find_payload(&self, addr: usize) -> Option<Object> {
        self.iter()
            .find(|object| object.payload().as_ptr() as usize == addr)
    }

    /// Unlink every object for which `keep` returns false.
    ///
    /// `removed` runs after the object is unlinked and may overwrite its
    /// memory. Survivors keep their relative order.
    pub fn retain<K, R>(&mut self, mut keep: K, mut removed: R)
    where
        K: FnMut(Object) -> bool,
        R: FnMut(Object),
    {
        let mut link: *mut *mut ObjectHeader = &raw mut self.head;

        // SAFETY: registry nodes are valid headers; `next` is read before `removed` runs.
        unsafe {
            while let Some(header) = NonNull::new(*link) {
                let object = Object::from_header(header);
                if keep(object) {
                    link = &raw mut (*header.as_ptr()).next;
                } else {
                    *link = object.next();
                    self.len -= 1;
                    removed(object);
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the objects of a [`Registry`].
pub struct Objects<'a> {
    current: *mut ObjectHeader,
    _registry: std::marker::PhantomData<&'a Registry>,
}

impl Iterator for Objects<'_> {
    type Item = Object;

    fn next(&mut self) -> Option<Object> {
        let header = NonNull::new(self.current)?;
        // SAFETY: the borrowed registry keeps its headers valid.
        let object = unsafe { Object::from_header(header) };
        self.current = object.next();
        Some(object)
    }
}
