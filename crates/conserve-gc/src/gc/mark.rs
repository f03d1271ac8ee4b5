//! Mark phase.

use std::ops::Range;

use crate::heap::{Arena, Object, Registry};
use crate::scan;

/// Transitive marker over the conservative object graph.
///
/// Objects are flagged before they are pushed, so each one enters the
/// worklist at most once and cycles terminate. The worklist lives on the
/// system heap; the depth of the object graph never touches the call stack.
pub struct Marker<'a> {
    heap: Range<usize>,
    registry: &'a Registry,
    worklist: Vec<Object>,
    marked: usize,
}

impl<'a> Marker<'a> {
    /// A marker over the objects of `registry`, which live in `arena`.
    #[must_use]
    pub fn new(arena: &Arena, registry: &'a Registry) -> Self {
        Self {
            heap: arena.range(),
            registry,
            worklist: Vec::new(),
            marked: 0,
        }
    }

    /// Offer a word as a root. Returns whether it was a candidate.
    pub fn add_root(&mut self, word: usize) -> bool {
        if !scan::is_candidate(word, &self.heap) {
            return false;
        }
        self.mark(word);
        true
    }

    /// Mark the object enclosing `addr`, if any, and queue it for scanning.
    fn mark(&mut self, addr: usize) {
        if !self.heap.contains(&addr) {
            return;
        }
        let Some(object) = self.registry.find_containing(addr) else {
            return;
        };
        if object.is_marked() {
            return;
        }
        object.set_marked(true);
        self.marked += 1;
        self.worklist.push(object);
    }

    /// Scan queued payloads until everything reachable is marked.
    pub fn drain(&mut self) {
        while let Some(object) = self.worklist.pop() {
            let payload = object.payload().as_ptr() as usize;
            // SAFETY: a live object's payload is readable arena memory.
            unsafe {
                scan::scan_words(payload, object.size(), |word| {
                    if scan::is_candidate(word, &self.heap) {
                        self.mark(word);
                    }
                });
            }
        }
    }

    /// Objects marked so far.
    #[must_use]
    pub const fn marked(&self) -> usize {
        self.marked
    }
}
