//! Merge and index benchmarks.

use budgetsync_bench::{random_delta, random_snapshot};
use budgetsync_engine::{build_replica, merge_entities, merge_months, rebuild_indices};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark merging a delta into a transaction collection.
fn bench_merge_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_entities");

    for size in [1_000, 10_000, 50_000].iter() {
        let base = random_snapshot(*size);
        let delta = random_delta(*size, size / 100);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let merged = merge_entities(black_box(&base.transactions), black_box(&delta.transactions));
                black_box(merged);
            });
        });
    }
    group.finish();
}

/// Benchmark merging months with nested categories.
fn bench_merge_months(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_months");

    for size in [1_000, 10_000].iter() {
        let base = random_snapshot(*size);
        let delta = random_delta(*size, 10);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let merged = merge_months(black_box(&base.months), black_box(&delta.months));
                black_box(merged);
            });
        });
    }
    group.finish();
}

/// Benchmark rebuilding every index of a replica.
fn bench_rebuild_indices(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild_indices");

    for size in [1_000, 10_000, 50_000].iter() {
        let replica = build_replica("bench", random_snapshot(*size), 1);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let rebuilt = rebuild_indices(black_box(replica.clone()));
                black_box(rebuilt);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_merge_entities,
    bench_merge_months,
    bench_rebuild_indices
);
criterion_main!(benches);
