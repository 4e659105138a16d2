//! Cache benchmarks: read path, write path with timer scheduling, and
//! bounded eviction churn.
//!
//! Run with: `cargo bench --bench cache`

use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use expirykit::builder::CacheBuilder;
use expirykit::cache::Cache;

const CAPACITY: u64 = 4_096;
const OPS: u64 = 10_000;
const TTL: Duration = Duration::from_secs(120);

fn filled(limit: usize) -> Cache<u64, Arc<u64>> {
    let cache = CacheBuilder::new(TTL)
        .limit(limit)
        .name("bench")
        .build()
        .expect("cache construction");
    for i in 0..CAPACITY {
        cache.set(i, Arc::new(i));
    }
    cache
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("hit_unbounded", |b| {
        let cache = filled(0);
        b.iter(|| {
            for i in 0..OPS {
                black_box(cache.get(&(i % CAPACITY)));
            }
        })
    });

    group.bench_function("hit_bounded", |b| {
        let cache = filled(CAPACITY as usize);
        b.iter(|| {
            for i in 0..OPS {
                black_box(cache.get(&(i % CAPACITY)));
            }
        })
    });

    group.bench_function("miss", |b| {
        let cache = filled(0);
        b.iter(|| {
            for i in 0..OPS {
                black_box(cache.get(&(CAPACITY + i)));
            }
        })
    });

    group.finish();
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_set");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("overwrite", |b| {
        let cache = filled(0);
        b.iter(|| {
            for i in 0..OPS {
                cache.set(i % CAPACITY, Arc::new(i));
            }
        })
    });

    group.bench_function("eviction_churn", |b| {
        b.iter_custom(|iters| {
            let cache = filled(CAPACITY as usize);
            let start = Instant::now();
            for round in 0..iters {
                for i in 0..OPS {
                    cache.set(CAPACITY + round * OPS + i, Arc::new(i));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

fn bench_take_contended(c: &mut Criterion) {
    c.bench_function("cache_take_4_threads", |b| {
        b.iter_custom(|iters| {
            let cache = Arc::new(filled(0));
            let start = Instant::now();
            let handles: Vec<_> = (0..4u64)
                .map(|t| {
                    let cache = Arc::clone(&cache);
                    thread::spawn(move || {
                        for _ in 0..iters {
                            for i in 0..OPS / 4 {
                                let key = (t * 7 + i) % (CAPACITY * 2);
                                let value = cache.take(key, || Ok::<_, std::io::Error>(Arc::new(key)));
                                black_box(value.ok());
                            }
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().expect("bench thread");
            }
            start.elapsed()
        })
    });
}

criterion_group!(benches, bench_get, bench_set, bench_take_contended);
criterion_main!(benches);
