//! Criterion benchmarks for broadcast fanout
//!
//! Measures one broadcast over registries of increasing size with a transport
//! that accepts every push.

use async_trait::async_trait;
use chat_fanout::{
    fanout::{ConnectionRegistry, FanoutEngine, PushError, PushTransport},
    models::{ConnectionRecord, Message},
    state::InMemoryStore,
};
use chrono::Duration as ChronoDuration;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

struct AcceptAll;

#[async_trait]
impl PushTransport for AcceptAll {
    async fn push(&self, _connection_id: &str, payload: &[u8]) -> Result<(), PushError> {
        black_box(payload);
        Ok(())
    }
}

fn bench_broadcast(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("broadcast");

    for peers in [10usize, 100, 1_000] {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(InMemoryStore::new())));
        rt.block_on(async {
            for i in 0..peers {
                let record = ConnectionRecord::new(format!("c{}", i), None, None, ChronoDuration::hours(24));
                registry.add(record).await.unwrap();
            }
        });

        let engine = FanoutEngine::new(registry.clone(), Arc::new(AcceptAll), Duration::from_secs(5));
        let snapshot = rt.block_on(registry.snapshot()).unwrap();
        let message = Message::new(
            "general".to_string(),
            "u1".to_string(),
            "Alice".to_string(),
            "hello".to_string(),
            "c0".to_string(),
            ChronoDuration::days(30),
        );

        group.throughput(Throughput::Elements(peers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(peers), &peers, |b, _| {
            b.to_async(&rt).iter(|| async {
                let report = engine.broadcast(&message, &snapshot).await.unwrap();
                black_box(report);
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let registry = Arc::new(ConnectionRegistry::new(Arc::new(InMemoryStore::new())));
    rt.block_on(async {
        for i in 0..1_000 {
            let record = ConnectionRecord::new(format!("c{}", i), None, None, ChronoDuration::hours(24));
            registry.add(record).await.unwrap();
        }
    });

    c.bench_function("registry_snapshot_1000", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(registry.snapshot().await.unwrap());
        });
    });
}

criterion_group!(benches, bench_broadcast, bench_snapshot);
criterion_main!(benches);
