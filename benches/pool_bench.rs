//! Benchmarks for the resource pool.
//!
//! Benchmarks cover:
//! - Waiter queue push/pop ordering
//! - Acquire/release round trips on a warm pool
//! - Contended acquires queueing behind a small pool
//! - Cluster routing overhead

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use prometheus_resource_pool::builders::PoolBuilder;
use prometheus_resource_pool::core::{AcquireOptions, BoxError, Cluster, ClusterOptions, Pool};
use prometheus_resource_pool::infra::WaiterQueue;

use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn counting_pool(min: usize, max: usize, attribute: &str) -> Pool<u64> {
    let next = Arc::new(AtomicU64::new(0));
    PoolBuilder::new()
        .create(move || {
            let id = next.fetch_add(1, Ordering::Relaxed);
            async move { Ok::<_, BoxError>(id) }
        })
        .destroy(|_id: u64| async { Ok::<_, BoxError>(()) })
        .min(min)
        .max(max)
        .attribute(attribute)
        .build()
        .unwrap()
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_waiter_queue_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("waiter_queue_ordering");

    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut queue: WaiterQueue<u64> = WaiterQueue::new();
                let mut receivers = Vec::with_capacity(size as usize);
                for i in 0..size {
                    let (tx, rx) = tokio::sync::oneshot::channel();
                    receivers.push(rx);
                    queue.push(i, (i % 4) as i32, tx);
                }
                while let Some(waiter) = queue.pop() {
                    black_box(waiter.priority);
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Pool Benchmarks
// ============================================================================

fn bench_acquire_release_warm(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let pool = rt.block_on(async {
        let pool = counting_pool(8, 8, "bench");
        pool.open().await.unwrap();
        pool
    });

    c.bench_function("pool_acquire_release_warm", |b| {
        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let value = pool.acquire(AcquireOptions::new()).await.unwrap();
                pool.release(black_box(&value)).unwrap();
            }
        });
    });
}

fn bench_contended_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_contended_acquire");

    for callers in [4_usize, 16, 64] {
        group.throughput(Throughput::Elements(callers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(callers), &callers, |b, &callers| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let pool = counting_pool(2, 2, "bench");
                pool.open().await.unwrap();

                let tasks: Vec<_> = (0..callers)
                    .map(|i| {
                        let pool = pool.clone();
                        tokio::spawn(async move {
                            let options = AcquireOptions::new().with_priority((i % 3) as i32);
                            let value = pool.acquire(options).await.unwrap();
                            tokio::task::yield_now().await;
                            pool.release(&value).unwrap();
                        })
                    })
                    .collect();
                futures::future::join_all(tasks).await;
                black_box(pool.size());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Cluster Benchmarks
// ============================================================================

fn bench_cluster_routing(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cluster = rt.block_on(async {
        let cluster = Cluster::with_pools(
            ClusterOptions::default(),
            [
                counting_pool(4, 4, "r"),
                counting_pool(4, 4, "w"),
                counting_pool(4, 4, "r"),
            ],
        )
        .unwrap();
        cluster.open().await.unwrap();
        cluster
    });

    c.bench_function("cluster_acquire_release_routed", |b| {
        b.to_async(&rt).iter(|| {
            let cluster = cluster.clone();
            async move {
                let options = AcquireOptions::new().with_attributes(["w"]);
                let value = cluster.acquire(options).await.unwrap();
                cluster.release(black_box(&value)).unwrap();
            }
        });
    });
}

criterion_group!(queue_benches, bench_waiter_queue_ordering);

criterion_group!(pool_benches, bench_acquire_release_warm, bench_contended_acquire);

criterion_group!(cluster_benches, bench_cluster_routing);

criterion_main!(queue_benches, pool_benches, cluster_benches);
