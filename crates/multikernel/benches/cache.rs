//! Benchmark suite for the multikernel substrate
//!
//! Run with: `cargo bench --package multikernel`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use multikernel::prelude::*;

// ============================================================================
// Dynamic Cache Benchmarks
// ============================================================================

fn cache_put_get_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/put_get");

    for size in [256usize, 1024, 4096].iter() {
        let cache: DynamicCache<u64, Vec<u8>> = DynamicCache::new(*size, 0);
        let payload = vec![0xA5u8; 64];

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("entries", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size as u64 {
                    cache.put(black_box(i), black_box(payload.clone()));
                }
                for i in 0..size as u64 {
                    black_box(cache.get(&i));
                }
            })
        });
    }

    group.finish();
}

fn cache_churn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/churn");

    // Keyspace larger than capacity keeps the LRU tail busy.
    let cache: DynamicCache<u64, u64> = DynamicCache::new(128, 0);
    group.throughput(Throughput::Elements(1024));
    group.bench_function("overflow_evictions", |b| {
        b.iter(|| {
            for i in 0..1024u64 {
                cache.put(black_box(i % 512), black_box(i));
            }
        })
    });

    group.finish();
}

// ============================================================================
// Balancer Scoring Benchmarks
// ============================================================================

fn balancer_selection_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("balancer/weights");

    let balancer = LoadBalancer::new();
    group.bench_function("set_resource_weights", |b| {
        b.iter(|| {
            balancer.set_resource_weights(
                black_box(0.3),
                black_box(0.25),
                black_box(0.25),
                black_box(0.2),
            );
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    cache_put_get_benchmark,
    cache_churn_benchmark,
    balancer_selection_benchmark
);
criterion_main!(benches);
