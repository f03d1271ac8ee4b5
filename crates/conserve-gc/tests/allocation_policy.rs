//! Threshold collections, exhaustion and resizing.

use std::hint::black_box;
use std::ptr::NonNull;

use conserve_gc::heap::HEADER_SIZE;
use conserve_gc::{AllocError, CollectInfo, CollectionTrigger, Collector, GcConfig};

fn addr(ptr: NonNull<u8>) -> usize {
    ptr.as_ptr() as usize
}

#[test]
fn test_threshold_triggers_collection_before_allocating() {
    let arena = 64 * 1024;
    let mut gc = Collector::new(GcConfig::new().arena_size(arena).threshold(0.5)).unwrap();
    let span = HEADER_SIZE + 1000;

    for _ in 0..200 {
        let before = gc.stats();
        #[allow(clippy::cast_precision_loss)]
        let expect_collection = (before.bytes_in_use + span) as f64 > 0.5 * arena as f64;

        black_box(gc.allocate(1000).unwrap());

        let after = gc.stats();
        assert_eq!(
            after.collections - before.collections,
            usize::from(expect_collection)
        );
        if expect_collection {
            assert_eq!(gc.metrics().trigger, CollectionTrigger::Threshold);
        }
        // Usage never ends up past the threshold by more than one object.
        assert!(after.bytes_in_use <= arena / 2 + span);
    }
    assert!(gc.stats().collections > 0);
    gc.verify().unwrap();
}

#[test]
fn test_custom_condition_defers_to_allocation_failure() {
    fn never(_: &CollectInfo) -> bool {
        false
    }
    let arena = 32 * 1024;
    let mut gc = Collector::new(
        GcConfig::new()
            .arena_size(arena)
            .collect_condition(never),
    )
    .unwrap();

    let mut peak = 0;
    for _ in 0..500 {
        black_box(gc.allocate(200).unwrap());
        peak = peak.max(gc.bytes_in_use());
    }

    // Without a threshold the arena fills up before anything is collected.
    assert!(gc.stats().collections > 0);
    assert_eq!(gc.metrics().trigger, CollectionTrigger::AllocationFailure);
    assert!(peak > arena - (HEADER_SIZE + 200));
}

/// Build a singly linked list through payloads until the arena is full.
/// Every object stays reachable from `head`, so nothing can be reclaimed.
#[test]
fn test_exhaustion_returns_error_without_corruption() {
    let mut gc = Collector::new(GcConfig::new().arena_size(16 * 1024)).unwrap();
    let head = gc.allocate(512).unwrap();
    let mut tail = head;
    let mut length = 1;

    let err = loop {
        match gc.allocate(512) {
            Ok(next) => {
                unsafe { tail.as_ptr().cast::<usize>().write(addr(next)) };
                tail = next;
                length += 1;
            }
            Err(err) => break err,
        }
    };

    assert_eq!(err, AllocError::OutOfMemory { requested: 512 });
    assert_eq!(gc.metrics().trigger, CollectionTrigger::AllocationFailure);
    assert_eq!(gc.stats().live_objects, length);
    gc.verify().unwrap();

    // The list is intact and the collector still serves requests that fit.
    let mut cursor = addr(head);
    let mut walked = 0;
    while cursor != 0 {
        walked += 1;
        cursor = unsafe { (cursor as *const usize).read() };
    }
    assert_eq!(walked, length);
    let free = gc.stats().free_bytes;
    if free >= HEADER_SIZE + 8 {
        assert!(gc.allocate(8).is_ok());
    }
    black_box(head);
}

#[test]
fn test_request_larger_than_arena_fails_fast() {
    let mut gc = Collector::new(GcConfig::new().arena_size(16 * 1024)).unwrap();
    let result = gc.allocate(32 * 1024);
    assert_eq!(result, Err(AllocError::OutOfMemory { requested: 32 * 1024 }));
    assert_eq!(gc.stats().allocations, 0);
    gc.verify().unwrap();
}

#[test]
fn test_resize_grow_copies_contents() {
    let mut gc = Collector::new(GcConfig::new().arena_size(64 * 1024)).unwrap();
    let small = gc.allocate(40).unwrap();
    for i in 0..40u8 {
        unsafe { small.as_ptr().add(usize::from(i)).write(i) };
    }

    let grown = gc.resize(Some(small), 400).unwrap().unwrap();
    assert_ne!(grown, small);
    assert_eq!(gc.payload_size(grown), Some(400));
    let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 400) };
    for (i, &b) in bytes.iter().enumerate() {
        let expected = if i < 40 { u8::try_from(i).unwrap() } else { 0 };
        assert_eq!(b, expected, "byte {i}");
    }

    // The old object is ordinary garbage now.
    gc.collect_from_roots(&[addr(grown)]);
    assert_eq!(gc.payload_size(small), None);
    assert_eq!(gc.payload_size(grown), Some(400));
}

#[test]
fn test_resize_within_capacity_returns_same_pointer() {
    let mut gc = Collector::new(GcConfig::new().arena_size(64 * 1024)).unwrap();
    let ptr = gc.allocate(100).unwrap();
    let capacity = gc.payload_size(ptr).unwrap();

    assert_eq!(gc.resize(Some(ptr), capacity).unwrap(), Some(ptr));
    assert_eq!(gc.resize(Some(ptr), 1).unwrap(), Some(ptr));
    assert_eq!(gc.stats().allocations, 1);
}

#[test]
fn test_resize_of_none_allocates() {
    let mut gc = Collector::new(GcConfig::new().arena_size(64 * 1024)).unwrap();
    let ptr = gc.resize(None, 24).unwrap().unwrap();
    assert_eq!(gc.payload_size(ptr), Some(24));
    assert_eq!(gc.stats().allocations, 1);
}

#[test]
fn test_resize_to_zero_keeps_object_until_unreachable() {
    let mut gc = Collector::new(GcConfig::new().arena_size(64 * 1024)).unwrap();
    let ptr = gc.allocate(64).unwrap();

    assert_eq!(gc.resize(Some(ptr), 0).unwrap(), None);
    assert_eq!(gc.payload_size(ptr), Some(64));

    gc.collect_from_roots(&[]);
    assert_eq!(gc.payload_size(ptr), None);
}

#[test]
fn test_zero_allocate_is_zeroed_and_checks_overflow() {
    let mut gc = Collector::new(GcConfig::new().arena_size(64 * 1024)).unwrap();
    let ptr = gc.zero_allocate(10, 12).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 120) };
    assert!(bytes.iter().all(|&b| b == 0));

    assert!(matches!(
        gc.zero_allocate(usize::MAX / 2, 3),
        Err(AllocError::SizeOverflow { .. })
    ));
}
