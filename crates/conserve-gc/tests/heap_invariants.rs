//! Layout invariants of the arena across allocation and collection.
//!
//! These tests root objects explicitly through `collect_from_roots`, so what
//! survives never depends on what the compiler left on the stack.

use std::ptr::NonNull;

use conserve_gc::heap::{HEADER_SIZE, MIN_FREE_BLOCK};
use conserve_gc::{Collector, GcConfig};

fn collector(arena_size: usize) -> Collector {
    Collector::new(GcConfig::new().arena_size(arena_size)).unwrap()
}

fn addr(ptr: NonNull<u8>) -> usize {
    ptr.as_ptr() as usize
}

/// Deterministic size sequence, no RNG needed.
fn sizes(count: usize) -> impl Iterator<Item = usize> {
    (0..count).map(|i| (i * 37 + 11) % 200 + 1)
}

fn assert_layout(gc: &Collector) {
    gc.verify().unwrap();

    let mut live: Vec<_> = gc.live_ranges().collect();
    live.sort_by_key(|range| range.start);
    for pair in live.windows(2) {
        // Payloads never overlap, and a header sits between neighbours.
        assert!(pair[0].end + HEADER_SIZE <= pair[1].start);
    }

    let spans: Vec<_> = gc.free_spans().collect();
    for pair in spans.windows(2) {
        let (a, a_size) = pair[0];
        let (b, _) = pair[1];
        assert!(a < b, "free list out of order");
        assert!(a + a_size < b, "adjacent free spans were not coalesced");
    }
    for &(_, size) in &spans {
        assert!(size >= MIN_FREE_BLOCK);
    }

    let live_bytes: usize = live.iter().map(|r| r.len() + HEADER_SIZE).sum();
    assert_eq!(live_bytes, gc.bytes_in_use());
    let free_bytes: usize = spans.iter().map(|&(_, size)| size).sum();
    assert_eq!(live_bytes + free_bytes, gc.stats().arena_size);
}

#[test]
fn test_fresh_collector_is_one_free_span() {
    let gc = collector(64 * 1024);
    let spans: Vec<_> = gc.free_spans().collect();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].1, 64 * 1024);
    assert_eq!(gc.bytes_in_use(), 0);
    assert_layout(&gc);
}

#[test]
fn test_layout_holds_through_mixed_workload() {
    let mut gc = collector(256 * 1024);

    for round in 0..5 {
        let ptrs: Vec<usize> = sizes(150)
            .map(|size| addr(gc.allocate(size + round).unwrap()))
            .collect();
        assert_layout(&gc);

        // Keep every third object, plus whatever earlier rounds kept.
        let mut roots: Vec<usize> = ptrs.iter().copied().step_by(3).collect();
        roots.extend(gc.live_ranges().map(|r| r.start).filter(|a| !ptrs.contains(a)));
        gc.collect_from_roots(&roots);
        assert_layout(&gc);

        for root in &roots {
            assert!(gc.live_ranges().any(|r| r.start == *root));
        }
    }
}

#[test]
fn test_full_reclaim_coalesces_into_single_span() {
    let mut gc = collector(64 * 1024);
    for size in sizes(100) {
        gc.allocate(size).unwrap();
    }

    gc.collect_from_roots(&[]);

    assert_eq!(gc.bytes_in_use(), 0);
    assert_eq!(gc.stats().live_objects, 0);
    let spans: Vec<_> = gc.free_spans().collect();
    assert_eq!(spans, vec![(spans[0].0, 64 * 1024)]);
    assert_eq!(gc.metrics().objects_reclaimed, 100);
}

#[test]
fn test_allocations_are_aligned_and_zeroed() {
    let mut gc = collector(64 * 1024);
    let dirty = gc.allocate(256).unwrap();
    unsafe { dirty.as_ptr().write_bytes(0xff, 256) };
    gc.collect_from_roots(&[]);

    // The same span comes back first fit; it must be scrubbed.
    for size in [1, 7, 8, 9, 100, 256] {
        let ptr = gc.allocate(size).unwrap();
        assert_eq!(addr(ptr) % 8, 0);
        let capacity = gc.payload_size(ptr).unwrap();
        assert!(capacity >= size);
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), capacity) };
        assert!(bytes.iter().all(|&b| b == 0));
    }
    assert_layout(&gc);
}
