//! Benchmarks for namespace derivation and tagged reads

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tagcache::{CacheService, InMemoryStore, Repository, namespaced_key};

fn namespaced_key_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("namespaced_key");
    group.throughput(Throughput::Elements(1));

    for tags in [1usize, 4, 16] {
        let namespace = (0..tags)
            .map(|_| tagcache::generate_identifier())
            .collect::<Vec<_>>()
            .join("|");

        group.bench_with_input(BenchmarkId::from_parameter(tags), &namespace, |b, ns| {
            b.iter(|| namespaced_key(black_box(ns), black_box("goodwin.com/ad-units")));
        });
    }

    group.finish();
}

fn tagged_get_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = CacheService::new(InMemoryStore::new());

    let mut group = c.benchmark_group("tagged_get");
    group.throughput(Throughput::Elements(1));

    for tags in [1usize, 4, 16] {
        let names: Vec<String> = (0..tags).map(|i| format!("tag-{}", i)).collect();
        let tagged = cache.tags(names);
        rt.block_on(async {
            tagged.forever("key", b"value".to_vec()).await.unwrap();
        });

        group.bench_with_input(BenchmarkId::new("hit", tags), &tagged, |b, tagged| {
            b.to_async(&rt).iter(|| async {
                let value = tagged.get("key").await.unwrap();
                black_box(value)
            });
        });
    }

    group.bench_function("untagged_hit", |b| {
        rt.block_on(async {
            cache.forever("plain", b"value".to_vec()).await.unwrap();
        });
        b.to_async(&rt).iter(|| async {
            let value = cache.get("plain").await.unwrap();
            black_box(value)
        });
    });

    group.finish();
}

fn flush_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = CacheService::new(InMemoryStore::new());
    let tagged = cache.tags(["a", "b", "c", "d"]);

    c.bench_function("flush_four_tags", |b| {
        b.to_async(&rt).iter(|| async {
            tagged.flush().await.unwrap();
        });
    });
}

criterion_group!(
    benches,
    namespaced_key_benchmark,
    tagged_get_benchmark,
    flush_benchmark
);
criterion_main!(benches);
