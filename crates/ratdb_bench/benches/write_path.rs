//! Write path benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ratdb::{WriteBatch, WriteOptions};
use ratdb_bench::{bench_key, open_empty, random_data};

/// Benchmark single puts across value sizes.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");

    for size in [64, 256, 1024, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let bench = open_empty();
            let data = random_data(size);
            let wo = WriteOptions::new();
            let mut i = 0usize;
            b.iter(|| {
                bench.db.put(&wo, &bench_key(i), black_box(&data)).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

/// Benchmark batched writes.
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");

    for count in [10, 100, 1000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let bench = open_empty();
            let data = random_data(128);
            let wo = WriteOptions::new();
            let mut round = 0usize;
            b.iter(|| {
                let mut batch = WriteBatch::new().unwrap();
                for i in 0..count {
                    batch.put(&bench_key(round * count + i), &data);
                }
                bench.db.write(&wo, &batch).unwrap();
                round += 1;
            });
        });
    }
    group.finish();
}

/// Benchmark synced against unsynced puts.
fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync");
    group.sample_size(20);

    for sync in [false, true] {
        group.bench_function(if sync { "synced" } else { "buffered" }, |b| {
            let bench = open_empty();
            let wo = WriteOptions::new().sync(sync);
            let mut i = 0usize;
            b.iter(|| {
                bench.db.put(&wo, &bench_key(i), b"value").unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_put, bench_batch, bench_sync);
criterion_main!(benches);
