use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use re2_pattern_cache_core::{CacheConfig, CacheConfigBuilder, PatternCache, Re2LikeEngine};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn cache_with_size(max_cache_size: usize) -> Arc<PatternCache<Re2LikeEngine>> {
    PatternCache::new(
        Re2LikeEngine,
        CacheConfigBuilder::default()
            .max_cache_size(max_cache_size)
            .max_simultaneous_compiled_patterns(max_cache_size.max(1))
            .eviction_scan_interval(Duration::from_secs(3600))
            .idle_timeout(Duration::from_secs(3600))
            .deferred_cleanup_interval(Duration::from_secs(3600))
            .build()
            .unwrap(),
    )
}

fn bench_compile_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_sequential");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let cache = cache_with_size(size * 2);
                for i in 0..size {
                    let m = cache.get_or_compile(&format!("pattern-{i}-[a-z]+"), true).unwrap();
                    black_box(&m);
                }
                cache.shutdown();
            });
        });
    }

    group.finish();
}

fn bench_hit_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("hit_sequential");

    for size in [10, 100, 1000].iter() {
        let cache = cache_with_size(*size * 2);
        for i in 0..*size {
            drop(cache.get_or_compile(&format!("pattern-{i}"), true).unwrap());
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    let m = cache.get_or_compile(&format!("pattern-{i}"), true).unwrap();
                    black_box(m.handle().full_match(b"zzz"));
                }
            });
        });
        cache.shutdown();
    }

    group.finish();
}

fn bench_match_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_throughput");
    let cache = cache_with_size(16);
    let matcher = cache.get_or_compile(r"\d+", true).unwrap();

    group.bench_function("full_match", |b| {
        b.iter(|| black_box(matcher.handle().full_match(b"1234567890")));
    });
    group.bench_function("partial_match", |b| {
        b.iter(|| black_box(matcher.handle().partial_match(b"abc1234567890xyz")));
    });
    group.bench_function("capture_groups", |b| {
        b.iter(|| black_box(matcher.handle().capture_groups(b"abc1234567890xyz").unwrap()));
    });

    drop(matcher);
    cache.shutdown();
    group.finish();
}

fn bench_concurrent_shared_pattern(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_shared_pattern");

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let cache = cache_with_size(16);
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let cache = Arc::clone(&cache);
                            thread::spawn(move || {
                                for _ in 0..100 {
                                    let m = cache.get_or_compile("shared-bench-pattern", true).unwrap();
                                    black_box(m.handle().partial_match(b"shared-bench-pattern-input"));
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                    cache.shutdown();
                });
            },
        );
    }

    group.finish();
}

fn bench_eviction_under_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_under_pressure");

    group.bench_function("lru_overflow", |b| {
        b.iter(|| {
            let cache = PatternCache::new(
                Re2LikeEngine,
                CacheConfig::builder()
                    .max_cache_size(50)
                    .max_simultaneous_compiled_patterns(200)
                    .eviction_scan_interval(Duration::from_secs(3600))
                    .idle_timeout(Duration::from_secs(3600))
                    .deferred_cleanup_interval(Duration::from_secs(3600))
                    .build()
                    .unwrap(),
            );
            for i in 0..100 {
                drop(cache.get_or_compile(&format!("evict-key-{i}"), true).unwrap());
            }
            black_box(cache.statistics());
            cache.shutdown();
        });
    });

    group.finish();
}

fn bench_mixed_read_write_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_read_write_workload");

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("90_hit_10_compile", num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let cache = cache_with_size(64);
                    for i in 0..50 {
                        drop(cache.get_or_compile(&format!("warm-{i}"), true).unwrap());
                    }

                    let handles: Vec<_> = (0..num_threads)
                        .map(|thread_id| {
                            let cache = Arc::clone(&cache);
                            thread::spawn(move || {
                                for i in 0..100 {
                                    if i % 10 == 0 {
                                        drop(
                                            cache
                                                .get_or_compile(&format!("fresh-{thread_id}-{i}"), true)
                                                .unwrap(),
                                        );
                                    } else {
                                        let m = cache
                                            .get_or_compile(&format!("warm-{}", i % 50), true)
                                            .unwrap();
                                        black_box(m.handle().partial_match(b"x"));
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                    cache.shutdown();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_sequential,
    bench_hit_sequential,
    bench_match_throughput,
    bench_concurrent_shared_pattern,
    bench_eviction_under_pressure,
    bench_mixed_read_write_workload
);
criterion_main!(benches);
