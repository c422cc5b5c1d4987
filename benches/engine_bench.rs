//! STRATA - Performance Benchmarks
//! Throughput of the MemTable, filters, segment reads, merges and the store.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use strata::engine::bloom::BloomFilter;
use strata::engine::compaction::merge_segments;
use strata::engine::memtable::MemTable;
use strata::engine::sstable::Segment;
use strata::{Config, Entry, Store};

fn sorted_entries(n: usize, tag: &str) -> Vec<Entry> {
    (0..n)
        .map(|i| Entry::put(format!("key_{:06}", i), format!("{}_{:06}", tag, i)))
        .collect()
}

fn bench_memtable_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("memtable");

    group.bench_function("put_1000", |b| {
        b.iter(|| {
            let table = MemTable::new(usize::MAX);
            for i in 0..1000 {
                table.put(black_box(format!("key_{:06}", i)), black_box(format!("v{}", i)));
            }
        });
    });

    group.bench_function("get_hit", |b| {
        let table = MemTable::new(usize::MAX);
        for i in 0..1000 {
            table.put(format!("key_{:06}", i), format!("v{}", i));
        }
        b.iter(|| black_box(table.get("key_000500")));
    });

    group.bench_function("get_miss", |b| {
        let table = MemTable::new(usize::MAX);
        for i in 0..1000 {
            table.put(format!("key_{:06}", i), format!("v{}", i));
        }
        b.iter(|| black_box(table.get("nonexistent_key")));
    });

    group.finish();
}

fn bench_bloom_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("bloom_filter");

    group.bench_function("insert_1000", |b| {
        b.iter(|| {
            let mut bf = BloomFilter::new(1000, 0.01);
            for i in 0..1000 {
                bf.insert(black_box(format!("key_{:06}", i)));
            }
        });
    });

    let mut bf = BloomFilter::new(1000, 0.01);
    for i in 0..1000 {
        bf.insert(format!("key_{:06}", i));
    }
    group.bench_function("lookup_hit", |b| {
        b.iter(|| black_box(bf.might_contain("key_000500")));
    });
    group.bench_function("lookup_miss", |b| {
        b.iter(|| black_box(bf.might_contain("definitely_not_here")));
    });

    group.finish();
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");
    let config = Config::default();

    group.bench_function("build_10000", |b| {
        b.iter(|| Segment::build_from_sorted_entries(sorted_entries(10_000, "v"), 0, &config));
    });

    let segment = Segment::build_from_sorted_entries(sorted_entries(10_000, "v"), 0, &config);
    group.bench_function("read_hit", |b| {
        b.iter(|| black_box(segment.read("key_005000")));
    });
    group.bench_function("read_miss", |b| {
        b.iter(|| black_box(segment.read("key_005000x")));
    });

    for inputs in [2usize, 8, 32].iter() {
        let segments: Vec<_> = (0..*inputs)
            .map(|i| {
                Arc::new(Segment::build_from_sorted_entries(
                    sorted_entries(2_000, &format!("s{}", i)),
                    1,
                    &config,
                ))
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("merge", inputs), &segments, |b, segments| {
            b.iter(|| merge_segments(segments, 0, &config, false));
        });
    }

    group.finish();
}

fn bench_store_e2e(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_e2e");

    for size in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("put_get_cycle", size), size, |b, &size| {
            b.iter(|| {
                let store = Store::open(Config::default().with_memtable_max_entries(256)).unwrap();
                for i in 0..size {
                    store.put(format!("key_{:06}", i), format!("value_{:06}", i));
                }
                for i in 0..size {
                    black_box(store.get(&format!("key_{:06}", i)));
                }
                store.close().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_memtable_operations,
    bench_bloom_filter,
    bench_segment,
    bench_store_e2e
);
criterion_main!(benches);
