use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nimbusq::core::access::StaticAccountDirectory;
use nimbusq::sqs::{calculate_md5_of_attributes, calculate_md5_of_body};
use nimbusq::types::{MessageAttributeValue, MessageAttributes};
use nimbusq::{AccountId, EngineConfig, ReceiveOptions, SendMessageRequest, SqsEngine};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn owner() -> AccountId {
    AccountId::new("123456789012").unwrap()
}

fn engine() -> SqsEngine {
    let mut config = EngineConfig::default();
    config.metrics.enabled = false;
    SqsEngine::new(config, Arc::new(StaticAccountDirectory::with_accounts([owner()])))
}

/// Create a queue with a long visibility timeout so received messages stay hidden
async fn create_bench_queue(engine: &SqsEngine) -> String {
    let mut attributes = HashMap::new();
    attributes.insert("VisibilityTimeout".to_string(), "3600".to_string());
    engine
        .create_queue(&owner(), &format!("bench-{}", uuid::Uuid::new_v4()), &attributes)
        .await
        .unwrap()
}

/// Benchmark send_message with different message sizes
fn bench_send_message(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("send_message");

    for size in [100, 1024, 10240, 102400].iter() {
        let engine = engine();
        let url = rt.block_on(create_bench_queue(&engine));
        let body = "x".repeat(*size);

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.to_async(&rt).iter(|| async {
                let request = SendMessageRequest::new(body.clone());
                black_box(engine.send_message(&owner(), &url, request).await.unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark send, receive and delete of one message
fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = engine();
    let url = rt.block_on(create_bench_queue(&engine));
    let caller = owner();

    c.bench_function("round_trip", |b| {
        b.to_async(&rt).iter(|| async {
            engine
                .send_message(&caller, &url, SendMessageRequest::new("round trip"))
                .await
                .unwrap();
            let received = engine
                .receive_message(&caller, &url, ReceiveOptions::default())
                .await
                .unwrap();
            for message in received {
                engine
                    .delete_message(&caller, &url, &message.receipt_handle)
                    .await
                    .unwrap();
            }
        });
    });
}

/// Benchmark receiving batches from a pre-filled queue
fn bench_receive_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("receive_batch");

    for batch_size in [1u32, 5, 10].iter() {
        let engine = engine();
        let url = rt.block_on(create_bench_queue(&engine));
        let options = ReceiveOptions {
            max_messages: *batch_size,
            ..Default::default()
        };

        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &size| {
                b.iter_batched(
                    || {
                        rt.block_on(async {
                            for _ in 0..size {
                                engine
                                    .send_message(&owner(), &url, SendMessageRequest::new("m"))
                                    .await
                                    .unwrap();
                            }
                        });
                    },
                    |_| {
                        rt.block_on(async {
                            black_box(
                                engine
                                    .receive_message(&owner(), &url, options.clone())
                                    .await
                                    .unwrap(),
                            );
                        });
                    },
                    criterion::BatchSize::PerIteration,
                );
            },
        );
    }
    group.finish();
}

/// Benchmark concurrent sends across tasks
fn bench_concurrent_sends(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_sends");

    for concurrency in [1, 10, 100].iter() {
        let engine = engine();
        let url = rt.block_on(create_bench_queue(&engine));

        group.throughput(Throughput::Elements(*concurrency as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            concurrency,
            |b, &conc| {
                b.to_async(&rt).iter(|| async {
                    let handles: Vec<_> = (0..conc)
                        .map(|_| {
                            let engine = engine.clone();
                            let url = url.clone();
                            tokio::spawn(async move {
                                engine
                                    .send_message(&owner(), &url, SendMessageRequest::new("test"))
                                    .await
                                    .unwrap();
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.await.unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

/// Benchmark MD5 digests of bodies and attributes
fn bench_md5(c: &mut Criterion) {
    let body = "x".repeat(10240);
    c.bench_function("md5_of_body_10k", |b| {
        b.iter(|| black_box(calculate_md5_of_body(&body)));
    });

    let mut attributes = MessageAttributes::new();
    for i in 0..10 {
        attributes.insert(format!("attr{}", i), MessageAttributeValue::string("value"));
    }
    c.bench_function("md5_of_attributes_10", |b| {
        b.iter(|| black_box(calculate_md5_of_attributes(&attributes)));
    });
}

criterion_group!(
    benches,
    bench_send_message,
    bench_round_trip,
    bench_receive_batch,
    bench_concurrent_sends,
    bench_md5,
);
criterion_main!(benches);
