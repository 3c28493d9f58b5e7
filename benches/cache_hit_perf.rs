//! Benchmark: Cache hit performance

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jewel_customizer::controller::wrap_frame;
use jewel_customizer::{AssetCache, MaterialCatalog, MockAssetSource};

fn cache_hit_perf_benchmark(c: &mut Criterion) {
    let source = MockAssetSource::default();
    let cache = AssetCache::new(source.clone(), 4);
    for material in MaterialCatalog::default().materials() {
        cache.insert(source.bundle_for("ring-001", &material.id));
    }

    // The synchronous lookup used on every material switch
    c.bench_function("cache_get_cached_hit", |b| {
        b.iter(|| black_box(cache.get_cached(black_box("ring-001"), black_box("platinum"))))
    });

    c.bench_function("cache_get_cached_miss", |b| {
        b.iter(|| black_box(cache.get_cached(black_box("ring-002"), black_box("platinum"))))
    });

    c.bench_function("frame_wrap", |b| {
        b.iter(|| black_box(wrap_frame(black_box(-1234), black_box(36))))
    });
}

criterion_group!(benches, cache_hit_perf_benchmark);
criterion_main!(benches);
