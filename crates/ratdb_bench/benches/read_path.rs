//! Read path benchmarks: point lookups, multi-get and iteration.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use ratdb::ReadOptions;
use ratdb_bench::{bench_key, open_populated};

const KEYS: usize = 10_000;

/// Benchmark single lookups from memory and from tables.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for flushed in [false, true] {
        let bench = open_populated(KEYS, 256, flushed);
        let name = if flushed { "table" } else { "memtable" };
        group.bench_function(name, |b| {
            let mut rng = rand::thread_rng();
            let ro = ReadOptions::new();
            b.iter(|| {
                let key = bench_key(rng.gen_range(0..KEYS));
                black_box(bench.db.get(&ro, &key).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark N separate gets against one multi-get of the same keys.
fn bench_multi_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_get");
    let bench = open_populated(KEYS, 256, true);
    let ro = ReadOptions::new();

    for count in [1, 16, 128, 1024] {
        let keys: Vec<Vec<u8>> = (0..count).map(|i| bench_key(i * 7 % KEYS)).collect();
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("gets", count), &keys, |b, keys| {
            b.iter(|| {
                for key in keys {
                    black_box(bench.db.get(&ro, key).unwrap());
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("batched", count), &keys, |b, keys| {
            b.iter(|| black_box(bench.db.multi_get(&ro, keys).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark full forward scans with borrowed and copied entries.
fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");
    let bench = open_populated(KEYS, 64, true);
    group.throughput(Throughput::Elements(KEYS as u64));

    group.bench_function("borrowed", |b| {
        b.iter(|| {
            let mut iter = bench.db.iterator(&ReadOptions::new()).unwrap();
            iter.seek_to_first();
            let mut bytes = 0usize;
            while iter.valid() {
                bytes += iter.key().map_or(0, |k| k.len());
                bytes += iter.value().map_or(0, |v| v.len());
                iter.next();
            }
            black_box(bytes)
        });
    });

    group.bench_function("entries", |b| {
        b.iter(|| {
            let mut iter = bench.db.iterator(&ReadOptions::new()).unwrap();
            black_box(iter.entries().count())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_get, bench_multi_get, bench_iterate);
criterion_main!(benches);
