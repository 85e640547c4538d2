//! Basic benchmarks for the `slot_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use slot_pool::SlotPool;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = u64;
const TEST_VALUE: TestItem = 1024;
const BLOCK_CAPACITY: usize = 16;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("sp_basic");

    let allocs_op = allocs.operation("build");
    group.bench_function("build", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(SlotPool::<TestItem, BLOCK_CAPACITY>::new()));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("alloc_first");
    group.bench_function("alloc_first", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(SlotPool::<TestItem, BLOCK_CAPACITY>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.alloc());
            }

            start.elapsed()
        });
    });

    // The whole point of the pool: serving and reclaiming a slot in steady state
    // performs zero system allocator calls. The tracker output proves it.
    let allocs_op = allocs.operation("alloc_dealloc_steady_state");
    group.bench_function("alloc_dealloc_steady_state", |b| {
        b.iter_custom(|iters| {
            let mut pool = SlotPool::<TestItem, BLOCK_CAPACITY>::new();

            // Prime the free list so the measured loop never replenishes.
            let primed = pool.alloc();
            // SAFETY: The slot came from this pool and holds no live value.
            unsafe { pool.dealloc(primed) };

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let slot = pool.alloc();

                // SAFETY: The slot is writable and exclusively ours.
                unsafe { slot.write(black_box(TEST_VALUE)) };

                // SAFETY: The slot came from this pool, u64 needs no drop, and it
                // is returned exactly once.
                unsafe { pool.dealloc(black_box(slot)) };
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("grow_one_block");
    group.bench_function("grow_one_block", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| {
                let mut pool = SlotPool::<TestItem, BLOCK_CAPACITY>::new();

                // Exhaust the initial block so the measured alloc must grow.
                for _ in 0..BLOCK_CAPACITY {
                    _ = pool.alloc();
                }

                pool
            })
            .take(usize::try_from(iters).unwrap())
            .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.alloc());
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
