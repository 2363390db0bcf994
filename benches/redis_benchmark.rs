//! Performance benchmarks for the Redis backend
//!
//! This benchmark suite measures:
//! - Redis backend operations (set, get, delete)
//! - The lock primitives (SET NX PX, compare-and-delete script)
//! - Strategy lookups against a real network store
//!
//! Prerequisites:
//! - Redis running on localhost:6379 (or `TEST_REDIS_URL`)
//! - Run with: cargo bench --bench redis_benchmark --features redis
//! - View results: open target/criterion/report/index.html

#![cfg(feature = "redis")]

use cache_shield::backend::{CacheBackend, RedisBackend};
use cache_shield::loader::InMemoryLoader;
use cache_shield::{CacheClient, CacheEntity, CacheStrategy, DistributedLock, InlineScheduler};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Serialize, Deserialize)]
struct BenchEntity {
    id: u64,
    data: Vec<u8>,
}

impl CacheEntity for BenchEntity {
    type Key = u64;

    fn cache_key(&self) -> Self::Key {
        self.id
    }

    fn cache_prefix() -> &'static str {
        "redis_bench"
    }
}

// ============================================================================
// Redis Backend Setup
// ============================================================================

/// Create a Redis backend for benchmarking.
///
/// Pool size can be configured via `REDIS_POOL_SIZE`.
async fn setup_redis() -> RedisBackend {
    let url = std::env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let backend = RedisBackend::from_connection_string(&url)
        .await
        .expect("Failed to create Redis pool");
    assert!(
        backend.health_check().await.unwrap_or(false),
        "Redis is not reachable at {}. Make sure Redis is running.",
        url
    );
    backend
}

// ============================================================================
// Group 1: Redis Basic Operations
// ============================================================================

fn redis_basic_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("redis_backend");
    group.sample_size(50); // Fewer samples due to network latency

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    let backend = rt.block_on(async { setup_redis().await });

    for size in [100, 1_000, 10_000, 100_000].iter() {
        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("set", size), size, |b, &size| {
                let value = vec![1u8; size];

                b.to_async(&rt).iter(|| async {
                    backend
                        .set(
                            black_box("redis_bench_key"),
                            black_box(value.clone()),
                            Some(Duration::from_secs(60)),
                        )
                        .await
                        .expect("Failed to set")
                });
            });

        group
            .throughput(Throughput::Bytes(*size as u64))
            .bench_with_input(BenchmarkId::new("get_hit", size), size, |b, &size| {
                rt.block_on(async {
                    backend
                        .set("redis_bench_key", vec![1u8; size], Some(Duration::from_secs(60)))
                        .await
                        .expect("Failed to set");
                });

                b.to_async(&rt).iter(|| async {
                    backend
                        .get(black_box("redis_bench_key"))
                        .await
                        .expect("Failed to get")
                });
            });
    }

    group.bench_function("get_miss", |b| {
        b.to_async(&rt).iter(|| async {
            backend
                .get(black_box("redis_bench_nonexistent"))
                .await
                .expect("Failed to get")
        });
    });

    group.bench_function("delete", |b| {
        b.to_async(&rt).iter(|| async {
            backend
                .set("redis_bench_delete", vec![1u8; 1000], None)
                .await
                .expect("Failed to set");
            backend
                .delete(black_box("redis_bench_delete"))
                .await
                .expect("Failed to delete")
        });
    });

    rt.block_on(async {
        backend
            .mdelete(&["redis_bench_key", "redis_bench_delete"])
            .await
            .expect("Failed to clean up");
    });

    group.finish();
}

// ============================================================================
// Group 2: Lock Primitives
// ============================================================================

fn redis_lock_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("redis_lock");
    group.sample_size(50);

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    let backend = rt.block_on(async { setup_redis().await });
    let lock = DistributedLock::new(backend.clone(), Duration::from_secs(10));

    // SET NX PX + EVAL compare-and-delete
    group.bench_function("lock_cycle", |b| {
        b.to_async(&rt).iter(|| async {
            let guard = lock
                .try_acquire(black_box("lock:redis_bench:cycle"))
                .await
                .expect("Failed to acquire")
                .expect("Lock should be free");
            guard.release().await.expect("Failed to release")
        });
    });

    group.bench_function("lock_contended", |b| {
        rt.block_on(async {
            backend
                .set_if_absent("lock:redis_bench:held", b"other".to_vec(), Duration::from_secs(60))
                .await
                .expect("Failed to setnx");
        });

        b.to_async(&rt)
            .iter(|| async { lock.try_acquire(black_box("lock:redis_bench:held")).await });

        rt.block_on(async {
            backend
                .delete("lock:redis_bench:held")
                .await
                .expect("Failed to clean up");
        });
    });

    group.finish();
}

// ============================================================================
// Group 3: Strategy Lookups
// ============================================================================

fn redis_strategy_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("redis_strategy");
    group.sample_size(50);

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    let backend = rt.block_on(async { setup_redis().await });
    let client = CacheClient::new(backend, Arc::new(InlineScheduler));

    let loader = InMemoryLoader::new();
    loader.insert(
        1,
        BenchEntity {
            id: 1,
            data: vec![0u8; 1000],
        },
    );

    rt.block_on(async {
        client
            .get(&1, &loader, CacheStrategy::PassThrough)
            .await
            .expect("Failed to populate");
        client
            .get(&2, &loader, CacheStrategy::PassThrough)
            .await
            .expect("Failed to cache absence");
    });

    group.bench_function("pass_through_hit", |b| {
        b.to_async(&rt).iter(|| async {
            client
                .get(black_box(&1), &loader, CacheStrategy::PassThrough)
                .await
                .expect("Lookup failed")
        });
    });

    group.bench_function("null_marker_hit", |b| {
        b.to_async(&rt).iter(|| async {
            client
                .get(black_box(&2), &loader, CacheStrategy::PassThrough)
                .await
                .expect("Lookup failed")
        });
    });

    rt.block_on(async {
        client
            .invalidate::<BenchEntity>(&1)
            .await
            .expect("Failed to clean up");
        client
            .invalidate::<BenchEntity>(&2)
            .await
            .expect("Failed to clean up");
    });

    group.finish();
}

criterion_group!(
    benches,
    redis_basic_benchmarks,
    redis_lock_benchmarks,
    redis_strategy_benchmarks
);
criterion_main!(benches);
