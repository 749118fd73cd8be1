//! Drift comparison benchmarks.

use budgetsync_bench::{random_delta, random_snapshot};
use budgetsync_engine::{apply_delta, build_replica, compare_replicas, normalize_replica};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark comparing a replica against an identical full export.
fn bench_compare_clean(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_replicas_clean");

    for size in [1_000, 10_000].iter() {
        let snapshot = random_snapshot(*size);
        let merged = build_replica("bench", snapshot.clone(), 1);
        let truth = build_replica("bench", snapshot, 1);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let result = compare_replicas(black_box(&merged), black_box(&truth)).unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

/// Benchmark comparing a replica that missed a delta.
fn bench_compare_drifted(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_replicas_drifted");

    for size in [1_000, 10_000].iter() {
        let base = build_replica("bench", random_snapshot(*size), 1);
        let truth = apply_delta(&base, &random_delta(*size, size / 50), 2, base.last_synced_at);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let result = compare_replicas(black_box(&base), black_box(&truth)).unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

/// Benchmark normalization alone.
fn bench_normalize(c: &mut Criterion) {
    let replica = build_replica("bench", random_snapshot(10_000), 1);
    c.bench_function("normalize_replica_10000", |b| {
        b.iter(|| {
            let value = normalize_replica(black_box(&replica)).unwrap();
            black_box(value);
        });
    });
}

criterion_group!(
    benches,
    bench_compare_clean,
    bench_compare_drifted,
    bench_normalize
);
criterion_main!(benches);
