// Licensed under the MIT License.

#![allow(
    clippy::arithmetic_side_effects,
    reason = "it is fine to let our guard down in benchmark/test code"
)]

use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use coro_rt::dispatcher::{Dispatcher, DispatcherConfig};
use coro_rt::sequencer::{Sequencer, SequencerConfig};
use coro_rt::task::types::{QueueTarget, TaskKind};
use coro_rt::task::Task;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn criterion_benchmark(c: &mut Criterion) {
    group_post(c);
    group_sequencer_same_key(c);
    group_sequencer_distinct_keys(c);
}

/// Measure posting and draining `count` standalone tasks through a freshly
/// built dispatcher.
fn group_post(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatcher post");

    for count in &[1, 10, 100, 1000] {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::new("post_and_drain", count), count, |b, count| {
            b.iter(|| {
                let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
                let done = Arc::new(AtomicUsize::new(0));

                for _ in 0..*count {
                    let done = Arc::clone(&done);
                    dispatcher
                        .post(Task::new(
                            TaskKind::Standalone,
                            false,
                            QueueTarget::Any,
                            Box::pin(async move {
                                done.fetch_add(1, Ordering::Relaxed);
                            }),
                        ))
                        .unwrap();
                }

                dispatcher.drain();
                black_box(done.load(Ordering::Relaxed));
            });
        });
    }

    group.finish();
}

/// Measure `count` enqueues under the same key, which the sequencer must
/// serialize into a single FIFO chain.
fn group_sequencer_same_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequencer same key");

    for count in &[1, 10, 100] {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::new("enqueue_and_drain", count), count, |b, count| {
            b.iter(|| {
                let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
                let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());

                futures::executor::block_on(async {
                    let mut handles = Vec::new();
                    for i in 0..*count {
                        handles.push(sequencer.enqueue("bench-key", move |_ctx| async move {
                            Ok::<_, coro_rt::task::chain::TaskError>(black_box(i))
                        }));
                    }
                    for h in handles {
                        h.await.unwrap();
                    }
                });

                dispatcher.drain();
            });
        });
    }

    group.finish();
}

/// Measure `count` enqueues spread across distinct keys, which the sequencer
/// is free to run concurrently.
fn group_sequencer_distinct_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequencer distinct keys");

    for count in &[1, 10, 100] {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::new("enqueue_and_drain", count), count, |b, count| {
            b.iter(|| {
                let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
                let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());

                futures::executor::block_on(async {
                    let mut handles = Vec::new();
                    for i in 0..*count {
                        handles.push(sequencer.enqueue(i, move |_ctx| async move {
                            Ok::<_, coro_rt::task::chain::TaskError>(black_box(i))
                        }));
                    }
                    for h in handles {
                        h.await.unwrap();
                    }
                });

                dispatcher.drain();
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}

criterion_main!(benches);
