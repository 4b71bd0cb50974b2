//! End-to-end dispatch latency benchmarks.
//!
//! Submits batches through a queue backed by the zero-delay simulated
//! transport and waits for every request to be processed.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use tokio::sync::oneshot;

use gg_dispatch::{Engine, Mode, QueueSettings, RequestSettings, SimulatedTransport};

async fn run_batch(engine: &Engine, queue: &str, size: usize) {
    let mut done = Vec::with_capacity(size);
    for i in 0..size {
        let (tx, rx) = oneshot::channel();
        let tx = parking_lot::Mutex::new(Some(tx));
        engine
            .submit(RequestSettings::new(json!({ "seq": i })).with_queue(queue).on_complete(move |_| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(());
                }
            }))
            .expect("queue registered");
        done.push(rx);
    }
    futures::future::join_all(done).await;
}

fn bench_modes(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime");
    let engine = Engine::with_runtime(Arc::new(SimulatedTransport::default()), runtime.handle().clone());
    engine.create_queue(QueueSettings::new("request").mode(Mode::Request)).expect("queue");
    engine.create_queue(QueueSettings::new("response").mode(Mode::Response)).expect("queue");

    let mut group = c.benchmark_group("dispatch");
    for size in [1usize, 16, 128] {
        group.throughput(Throughput::Elements(size as u64));
        for mode in ["request", "response"] {
            group.bench_with_input(BenchmarkId::new(mode, size), &size, |b, &size| {
                b.iter(|| runtime.block_on(run_batch(&engine, mode, size)))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_modes);
criterion_main!(benches);
