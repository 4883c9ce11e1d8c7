// Licensed under the MIT License.

//! End-to-end scenarios exercising the dispatcher, sequencer, futures, and
//! spinlocks together, rather than any one module in isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coro_rt::dispatcher::{Dispatcher, DispatcherConfig};
use coro_rt::sequencer::{Sequencer, SequencerConfig};
use coro_rt::spinlock::RwSpinLock;
use coro_rt::task::types::{QueueTarget, TaskKind};
use coro_rt::task::Task;

#[test]
fn fifo_per_key() {
    let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
    let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());
    let order = Arc::new(Mutex::new(Vec::new()));

    futures::executor::block_on(async {
        let mut handles = Vec::new();
        for i in 0..20 {
            let order = Arc::clone(&order);
            handles.push(sequencer.enqueue("orders/42", move |ctx| async move {
                ctx.yield_now().await;
                order.lock().unwrap().push(i);
                Ok::<_, coro_rt::task::chain::TaskError>(i)
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    });

    dispatcher.drain();
    let observed: Vec<i32> = order.lock().unwrap().clone();
    assert_eq!(observed, (0..20).collect::<Vec<_>>());
}

#[test]
fn universal_barrier_waits_then_blocks() {
    let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
    let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());
    let log = Arc::new(Mutex::new(Vec::new()));

    futures::executor::block_on(async {
        let mut before = Vec::new();
        for key in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            before.push(sequencer.enqueue(key, move |ctx| async move {
                ctx.yield_now().await;
                log.lock().unwrap().push(format!("key:{key}"));
                Ok::<_, coro_rt::task::chain::TaskError>(())
            }));
        }

        let log_barrier = Arc::clone(&log);
        let barrier = sequencer.barrier(move |_ctx| async move {
            log_barrier.lock().unwrap().push("barrier".to_string());
            Ok::<_, coro_rt::task::chain::TaskError>(())
        });

        let log_after = Arc::clone(&log);
        let after = sequencer.enqueue("d", move |_ctx| async move {
            log_after.lock().unwrap().push("key:d".to_string());
            Ok::<_, coro_rt::task::chain::TaskError>(())
        });

        for h in before {
            h.await.unwrap();
        }
        barrier.await.unwrap();
        after.await.unwrap();
    });

    dispatcher.drain();
    let observed = log.lock().unwrap().clone();
    let barrier_index = observed.iter().position(|e| e == "barrier").unwrap();
    let after_index = observed.iter().position(|e| e == "key:d").unwrap();
    assert!(barrier_index < after_index);
    assert_eq!(barrier_index, 3, "barrier ran only after all 3 prior keys drained");
}

#[test]
fn multi_key_barrier_admits_concurrency_between_keys() {
    let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
    let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());
    let concurrent = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));

    futures::executor::block_on(async {
        let mut handles = Vec::new();
        for key in 0..5 {
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(sequencer.enqueue(key, move |ctx| async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                ctx.yield_now().await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, coro_rt::task::chain::TaskError>(())
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    });

    dispatcher.drain();
    assert!(max_concurrent.load(Ordering::SeqCst) > 1);
    assert_eq!(sequencer.pending_key_count(), 0);
}

#[test]
fn future_round_trip() {
    let dispatcher = Dispatcher::new(&DispatcherConfig::new(2, 1));

    let (promise, future) = coro_rt::future::channel::<u64>();
    dispatcher
        .post(Task::new(
            TaskKind::Standalone,
            false,
            QueueTarget::Any,
            Box::pin(async move {
                promise.set(7);
            }),
        ))
        .unwrap();

    let value = futures::executor::block_on(future.get()).unwrap();
    assert_eq!(value, 7);

    dispatcher.drain();
}

#[test]
fn broken_promise_is_observed_by_the_future() {
    let (promise, future) = coro_rt::future::channel::<u64>();
    drop(promise);

    let err = futures::executor::block_on(future.get()).unwrap_err();
    assert_eq!(err, coro_rt::future::FutureErrorKind::BrokenPromise);
}

#[test]
fn panicking_task_body_does_not_kill_the_worker() {
    let dispatcher = Dispatcher::new(&DispatcherConfig::new(2, 1));
    let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());

    let panicking = sequencer.enqueue("boom-key", move |_ctx| async move {
        panic!("deliberate task panic");
        #[allow(unreachable_code)]
        Ok::<_, coro_rt::task::chain::TaskError>(())
    });

    // Queued behind the panicking task under the same key: only runs if the
    // drain loop survives the panic above and keeps servicing the key.
    let survivor = sequencer.enqueue("boom-key", move |_ctx| async move {
        Ok::<_, coro_rt::task::chain::TaskError>(99)
    });

    let (panicking_result, survivor_result) =
        futures::executor::block_on(async { (panicking.await, survivor.await) });

    assert!(panicking_result.is_err());
    assert_eq!(survivor_result.unwrap(), 99);

    dispatcher.drain();
}

#[test]
fn rw_spinlock_upgrade_converges_under_contention() {
    let lock = Arc::new(RwSpinLock::new(0_u64));
    let r1 = lock.read();
    let r2 = lock.read();
    drop(r1);
    drop(r2);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let lock = Arc::clone(&lock);
            std::thread::spawn(move || {
                let read_guard = lock.read();
                let mut write_guard = read_guard.upgrade();
                *write_guard += 1;
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(lock.num_readers(), 0);
    assert!(!lock.is_write_locked());
    assert_eq!(lock.num_pending_upgrades(), 0);
    assert_eq!(*lock.read(), 10);
}
