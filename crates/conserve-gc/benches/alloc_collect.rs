//! Benchmark: allocation throughput and collection pause time.
//!
//! Measures first-fit allocation on a fragmented arena and the cost of a
//! full collection as the live set grows.

use std::hint::black_box;
use std::ptr::NonNull;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use conserve_gc::{Collector, GcConfig};

const ARENA: usize = 8 * 1024 * 1024;

fn collector() -> Collector {
    Collector::new(GcConfig::new().arena_size(ARENA)).unwrap()
}

fn link(slot: NonNull<u8>, target: NonNull<u8>) {
    unsafe { slot.as_ptr().cast::<usize>().write(target.as_ptr() as usize) };
}

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    for size in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut gc = collector();
            b.iter(|| black_box(gc.allocate(black_box(size)).unwrap()));
        });
    }
    group.finish();
}

fn bench_allocate_fragmented(c: &mut Criterion) {
    c.bench_function("allocate_fragmented", |b| {
        let mut gc = collector();
        // Keep every other object so the free list is a long run of holes.
        let ptrs: Vec<usize> = (0..10_000)
            .map(|_| gc.allocate(48).unwrap().as_ptr() as usize)
            .collect();
        let roots: Vec<usize> = ptrs.iter().copied().step_by(2).collect();
        gc.collect_from_roots(&roots);

        b.iter(|| black_box(gc.allocate(black_box(40)).unwrap()));
    });
}

fn bench_collect_live_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_live_list");
    for len in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut gc = collector();
            let head = gc.allocate(32).unwrap();
            let mut tail = head;
            for _ in 1..len {
                let next = gc.allocate(32).unwrap();
                link(tail, next);
                tail = next;
            }
            let root = head.as_ptr() as usize;
            b.iter(|| gc.collect_from_roots(black_box(&[root])));
        });
    }
    group.finish();
}

fn bench_collect_garbage(c: &mut Criterion) {
    c.bench_function("collect_1000_garbage", |b| {
        let mut gc = collector();
        b.iter(|| {
            for _ in 0..1_000 {
                black_box(gc.allocate(64).unwrap());
            }
            gc.collect_from_roots(&[]);
        });
    });
}

fn bench_stack_scan(c: &mut Criterion) {
    c.bench_function("collect_stack_scan", |b| {
        let mut gc = collector();
        let kept = gc.allocate(64).unwrap();
        b.iter(|| gc.collect());
        black_box(kept);
    });
}

criterion_group!(
    benches,
    bench_allocate,
    bench_allocate_fragmented,
    bench_collect_live_list,
    bench_collect_garbage,
    bench_stack_scan
);
criterion_main!(benches);
