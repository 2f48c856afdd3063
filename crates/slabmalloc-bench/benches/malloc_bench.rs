//! Allocator benchmarks: slab state vs the host libc.
//!
//! Only small classes are measured in loops; large requests map fresh
//! pages that are never returned, so iterating them would grow without
//! bound.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use slabmalloc_abi::malloc_abi::{slab_free, slab_malloc};
use slabmalloc_core::{HeapConfig, MallocState};

const SIZES: &[usize] = &[16, 64, 256, 1024, 2048];

fn quiet_state() -> MallocState {
    MallocState::new().with_config(HeapConfig::QUIET)
}

fn bench_alloc_free_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free_cycle");

    for &size in SIZES {
        group.bench_with_input(BenchmarkId::new("slab_state", size), &size, |b, &sz| {
            let mut state = quiet_state();
            b.iter(|| {
                let ptr = state.malloc(sz).unwrap().unwrap();
                criterion::black_box(ptr);
                // SAFETY: pointer just returned by this state.
                unsafe { state.free(ptr.as_ptr()) };
            });
        });
        group.bench_with_input(BenchmarkId::new("slab_c_abi", size), &size, |b, &sz| {
            b.iter(|| {
                // SAFETY: single-threaded bench; paired malloc/free.
                unsafe {
                    let ptr = slab_malloc(sz);
                    criterion::black_box(ptr);
                    slab_free(ptr);
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("system", size), &size, |b, &sz| {
            b.iter(|| {
                // SAFETY: paired libc malloc/free.
                unsafe {
                    let ptr = libc::malloc(sz);
                    criterion::black_box(ptr);
                    libc::free(ptr);
                }
            });
        });
    }
    group.finish();
}

fn bench_alloc_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_burst");

    group.bench_function("slab_state_1000x64B", |b| {
        let mut state = quiet_state();
        let mut live = Vec::with_capacity(1000);
        b.iter(|| {
            for _ in 0..1000 {
                live.push(state.malloc(64).unwrap().unwrap());
            }
            for ptr in live.drain(..) {
                // SAFETY: each pointer is live and freed once.
                unsafe { state.free(ptr.as_ptr()) };
            }
        });
    });

    group.bench_function("system_1000x64B", |b| {
        let mut live = Vec::with_capacity(1000);
        b.iter(|| {
            for _ in 0..1000 {
                // SAFETY: plain libc allocation.
                live.push(unsafe { libc::malloc(64) });
            }
            for ptr in live.drain(..) {
                // SAFETY: each pointer is live and freed once.
                unsafe { libc::free(ptr) };
            }
        });
    });

    group.finish();
}

fn bench_usable_size(c: &mut Criterion) {
    let mut state = quiet_state();
    let small = state.malloc(100).unwrap().unwrap();
    c.bench_function("usable_size_slab_block", |b| {
        // SAFETY: `small` stays live for the whole bench.
        b.iter(|| unsafe { state.usable_size(criterion::black_box(small.as_ptr())) });
    });
}

criterion_group!(benches, bench_alloc_free_cycle, bench_alloc_burst, bench_usable_size);
criterion_main!(benches);
