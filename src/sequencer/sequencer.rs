// Licensed under the MIT License.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::dispatcher::Dispatcher;
use crate::sequencer::config::{ExceptionCallback, SequencerConfig};
use crate::sequencer::key_record::{KeyRecord, KeyStats};
use crate::sequencer::sequencer_task::key_drain_body;
use crate::sync::RwMutex;
use crate::task::chain::{TaskError, TaskResult};
use crate::task::panic_capture::capture_panic;
use crate::task::types::{QueueTarget, TaskKind};
use crate::task::{Task, TaskContext};
use crate::{future, TaskFuture};

pub(crate) struct Inner {
    /// Readers are per-key drain sessions; the writer is a universal
    /// barrier. A barrier therefore waits for every key session active when
    /// it was requested, and no new key session can start while it holds
    /// the write side.
    pub(crate) gate: RwMutex<()>,
    buckets: Vec<Mutex<HashMap<u64, KeyRecord>>>,
    pending_key_count: AtomicUsize,
    total_posted: AtomicU64,
    exception_callback: Option<ExceptionCallback>,
    opaque: Option<Arc<dyn std::any::Any + Send + Sync>>,
    dispatcher: Dispatcher,
}

impl Inner {
    fn bucket_for(&self, hash: u64) -> usize {
        (hash as usize) % self.buckets.len()
    }

    /// Pops the next queued job for a key, or retires the key's record if
    /// its backlog is empty. Called by [`key_drain_body`] after each job.
    pub(crate) fn pop_or_retire(
        &self,
        bucket_index: usize,
        key_hash: u64,
    ) -> Option<crate::sequencer::key_record::Job> {
        let mut bucket = self.buckets[bucket_index]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let record = bucket.get_mut(&key_hash)?;
        if let Some(job) = record.queue.pop_front() {
            return Some(job);
        }

        bucket.remove(&key_hash);
        self.pending_key_count.fetch_sub(1, Ordering::SeqCst);
        None
    }

    /// Reports `error` to the configured exception callback, if any. Never
    /// consumes `error` - callers still route it into the task's own promise
    /// afterwards.
    pub(crate) fn report_exception(&self, error: &TaskError) {
        if let Some(callback) = &self.exception_callback {
            callback(error, self.opaque.as_deref());
        }
    }
}

/// Layers per-key FIFO ordering and a universal barrier on top of a
/// [`Dispatcher`].
///
/// Two tasks enqueued under the same key always run in the order they were
/// enqueued, never concurrently with each other. Tasks under different keys
/// may run concurrently. A [`Sequencer::barrier`] body runs only once every
/// key session active at the time it was requested has finished, and holds
/// off any key session requested after it until the barrier body completes.
#[derive(Debug, Clone)]
pub struct Sequencer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("pending_key_count", &self.pending_key_count.load(Ordering::Relaxed))
            .field("total_posted", &self.total_posted.load(Ordering::Relaxed))
            .finish()
    }
}

/// A snapshot of the sequencer's overall posted/pending counters, returned by
/// [`Sequencer::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerStats {
    /// Total number of tasks ever enqueued across every key.
    pub posted: u64,
    /// Number of tasks currently running or queued across every key.
    pub pending: u64,
}

impl Sequencer {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, config: &SequencerConfig) -> Self {
        let buckets = (0..config.num_buckets.max(1)).map(|_| Mutex::new(HashMap::new())).collect();

        Self {
            inner: Arc::new(Inner {
                gate: RwMutex::new(()),
                buckets,
                pending_key_count: AtomicUsize::new(0),
                total_posted: AtomicU64::new(0),
                exception_callback: config.exception_callback.clone(),
                opaque: config.opaque.clone(),
                dispatcher,
            }),
        }
    }

    /// Number of distinct keys with a task currently running or queued.
    #[must_use]
    pub fn pending_key_count(&self) -> usize {
        self.inner.pending_key_count.load(Ordering::SeqCst)
    }

    /// A snapshot of this key's posted/pending counters, or `None` if the key
    /// has no tasks currently running or queued.
    #[must_use]
    pub fn key_stats<K: Hash>(&self, key: &K) -> Option<KeyStats> {
        let key_hash = hash_key(key);
        let bucket_index = self.inner.bucket_for(key_hash);
        let bucket = self.inner.buckets[bucket_index]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        bucket.get(&key_hash).map(|record| KeyStats {
            posted: record.posted,
            pending: record.pending(),
        })
    }

    /// A snapshot of the sequencer's overall posted/pending counters, summed
    /// across every tracked key.
    #[must_use]
    pub fn stats(&self) -> SequencerStats {
        let mut pending = 0_u64;
        for bucket in &self.inner.buckets {
            let bucket = bucket.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            pending += bucket.values().map(KeyRecord::pending).sum::<u64>();
        }
        SequencerStats {
            posted: self.inner.total_posted.load(Ordering::SeqCst),
            pending,
        }
    }

    /// Runs `body` under mutual exclusion with every other task enqueued
    /// under the same `key`, preserving enqueue order. Returns the chain's
    /// terminal result once `body` completes.
    pub async fn enqueue<K, F, Fut, T>(&self, key: K, body: F) -> TaskResult<T>
    where
        K: Hash,
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
        T: Send + Clone + 'static,
    {
        let key_hash = hash_key(&key);
        let bucket_index = self.inner.bucket_for(key_hash);

        let (promise, result_future) = future::channel::<T>();
        let inner_for_job = Arc::clone(&self.inner);
        let job: crate::sequencer::key_record::Job = Box::new(move || {
            let ctx = TaskContext::new(crate::task::id::next_task_id(), None);
            Box::pin(async move {
                match capture_panic(body(ctx)).await {
                    Ok(v) => promise.set(v),
                    Err(e) => {
                        inner_for_job.report_exception(&e);
                        promise.set_exception(e);
                    }
                }
            })
        });

        let must_start = {
            let mut bucket = self.inner.buckets[bucket_index]
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let record = bucket.entry(key_hash).or_default();
            record.posted += 1;
            if record.running {
                record.queue.push_back(job);
                None
            } else {
                record.running = true;
                Some(job)
            }
        };
        self.inner.total_posted.fetch_add(1, Ordering::SeqCst);

        if let Some(first) = must_start {
            self.inner.pending_key_count.fetch_add(1, Ordering::SeqCst);
            let inner = Arc::clone(&self.inner);
            let body = key_drain_body(inner, bucket_index, key_hash, first);
            let task = Task::new(TaskKind::Standalone, false, QueueTarget::Any, Box::pin(body));
            // Best effort: if the dispatcher is draining, the key record was
            // already marked running and will simply never be serviced.
            // Callers are expected to stop enqueuing before draining a
            // dispatcher shared with a sequencer.
            let _ = self.inner.dispatcher.post(task);
        }

        get_result(&result_future).await
    }

    /// Runs `body` once every key session active when this call began has
    /// completed, and before any key session requested after this call.
    pub async fn barrier<F, Fut, T>(&self, body: F) -> TaskResult<T>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
        T: Send + Clone + 'static,
    {
        let (promise, result_future) = future::channel::<T>();
        let inner = Arc::clone(&self.inner);

        let task_body = async move {
            let _permit = inner.gate.write().await;
            let ctx = TaskContext::new(crate::task::id::next_task_id(), None);
            match capture_panic(body(ctx)).await {
                Ok(v) => promise.set(v),
                Err(e) => {
                    inner.report_exception(&e);
                    promise.set_exception(e);
                }
            }
        };

        let task = Task::new(TaskKind::Standalone, true, QueueTarget::Any, Box::pin(task_body));
        let _ = self.inner.dispatcher.post(task);

        get_result(&result_future).await
    }

    /// Waits until no key has pending or running work. Does not prevent new
    /// work from being enqueued concurrently - a racing `enqueue` call may
    /// keep this from ever observing zero.
    pub async fn drain(&self) {
        while self.pending_key_count() > 0 {
            crate::yielding::yield_now().await;
        }
    }
}

async fn get_result<T: Clone>(future: &TaskFuture<T>) -> TaskResult<T> {
    future.get().await.map_err(|e| -> TaskError { format!("{e}").into() })
}

fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::dispatcher::DispatcherConfig;

    #[test]
    fn same_key_tasks_run_in_fifo_order() {
        let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
        let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        futures::executor::block_on(async {
            let mut futures = Vec::new();
            for i in 0..5 {
                let order = Arc::clone(&order);
                futures.push(sequencer.enqueue("same-key", move |_ctx| async move {
                    order.lock().unwrap().push(i);
                    Ok(i)
                }));
            }
            for f in futures {
                f.await.unwrap();
            }
        });

        dispatcher.drain();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn different_keys_do_not_block_each_other() {
        let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
        let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());
        let counter = Arc::new(AtomicUsize::new(0));

        futures::executor::block_on(async {
            let c1 = Arc::clone(&counter);
            let c2 = Arc::clone(&counter);
            let a = sequencer.enqueue("a", move |_ctx| async move {
                c1.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            let b = sequencer.enqueue("b", move |_ctx| async move {
                c2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            a.await.unwrap();
            b.await.unwrap();
        });

        dispatcher.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn barrier_waits_for_pending_keys_then_blocks_new_ones() {
        let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
        let sequencer = Sequencer::new(dispatcher.clone(), &SequencerConfig::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        futures::executor::block_on(async {
            let order1 = Arc::clone(&order);
            let keyed = sequencer.enqueue("k", move |ctx| async move {
                ctx.yield_now().await;
                order1.lock().unwrap().push("keyed");
                Ok(())
            });

            let order2 = Arc::clone(&order);
            let barrier = sequencer.barrier(move |_ctx| async move {
                order2.lock().unwrap().push("barrier");
                Ok(())
            });

            keyed.await.unwrap();
            barrier.await.unwrap();
        });

        dispatcher.drain();
        assert_eq!(*order.lock().unwrap(), vec!["keyed", "barrier"]);
    }
}
