// Licensed under the MIT License.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::debug;

use crate::dispatcher::config::DispatcherConfig;
use crate::dispatcher::core::DispatcherCore;
use crate::error::Result;
use crate::task::{IoTask, Task};

/// A cheap-to-clone handle to a running dispatcher.
///
/// Constructing one spawns `num_coroutine_threads` coroutine-worker threads
/// and `num_io_threads` I/O-worker threads immediately; they run until
/// [`Dispatcher::terminate`] or a [`Dispatcher::drain`] followed by queue
/// exhaustion. Every clone shares the same underlying queues and worker
/// threads - dropping a clone does not stop the dispatcher.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    core: Arc<DispatcherCore>,
    coroutine_handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    io_handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: &DispatcherConfig) -> Self {
        let core = Arc::new(DispatcherCore::new(config));

        let coroutine_handles = core
            .coroutine_queues()
            .iter()
            .map(|queue| {
                let queue = Arc::clone(queue);
                std::thread::Builder::new()
                    .name(format!("coro-worker-{}", queue.index()))
                    .spawn(move || queue.run())
                    .expect("failed to spawn coroutine-worker thread")
            })
            .collect();

        let io_handles = core
            .io_queues()
            .iter()
            .enumerate()
            .map(|(index, queue)| {
                let queue = queue.clone();
                std::thread::Builder::new()
                    .name(format!("io-worker-{index}"))
                    .spawn(move || queue.run())
                    .expect("failed to spawn io-worker thread")
            })
            .collect();

        debug!(
            coroutine_threads = core.num_coroutine_threads(),
            io_threads = core.num_io_threads(),
            "dispatcher started"
        );

        Self {
            core,
            coroutine_handles: Arc::new(Mutex::new(coroutine_handles)),
            io_handles: Arc::new(Mutex::new(io_handles)),
        }
    }

    /// Queues a coroutine task. If called from a coroutine-worker thread
    /// already polling another task, `QueueTarget::Same` resolves to that
    /// task's own queue; otherwise it falls back to `QueueTarget::Any`. Fails
    /// if the dispatcher is draining or has been terminated.
    pub fn post(&self, task: Task) -> Result<()> {
        self.core.post(task, crate::task::current_queue_index())
    }

    /// Queues a blocking I/O task. Fails if the dispatcher is draining or
    /// has been terminated.
    pub fn post_io(&self, task: IoTask) -> Result<()> {
        self.core.post_io(task)
    }

    #[must_use]
    pub fn num_coroutine_threads(&self) -> usize {
        self.core.num_coroutine_threads()
    }

    #[must_use]
    pub fn num_io_threads(&self) -> usize {
        self.core.num_io_threads()
    }

    /// Stops accepting new work and lets every queue run dry, then returns
    /// once all worker threads have exited. Safe to call multiple times (and
    /// from multiple clones) - later callers just join the same threads.
    pub fn drain(&self) {
        self.core.begin_drain();
        self.join_all();
    }

    /// Immediately stops every worker, abandoning queued and in-flight work,
    /// then waits for all worker threads to exit.
    pub fn terminate(&self) {
        self.core.terminate();
        self.join_all();
    }

    fn join_all(&self) {
        let mut coroutine_handles = self
            .coroutine_handles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for handle in coroutine_handles.drain(..) {
            _ = handle.join();
        }
        drop(coroutine_handles);

        let mut io_handles = self.io_handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for handle in io_handles.drain(..) {
            _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::task::types::{QueueTarget, TaskKind};

    #[test]
    fn posted_tasks_run_and_drain_returns() {
        let dispatcher = Dispatcher::new(&DispatcherConfig::new(2, 1));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            dispatcher
                .post(Task::new(
                    TaskKind::Standalone,
                    false,
                    QueueTarget::Any,
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                ))
                .unwrap();
        }

        dispatcher.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn same_target_posted_from_inside_a_task_lands_on_that_task_queue() {
        let dispatcher = Dispatcher::new(&DispatcherConfig::new(4, 1));
        let landed_on: Arc<Mutex<Option<usize>>> = Arc::new(Mutex::new(None));

        let dispatcher_inner = dispatcher.clone();
        let landed_inner = Arc::clone(&landed_on);
        dispatcher
            .post(Task::new(
                TaskKind::Standalone,
                false,
                QueueTarget::Id(2),
                Box::pin(async move {
                    assert_eq!(crate::task::current_queue_index(), Some(2));
                    let landed = Arc::clone(&landed_inner);
                    dispatcher_inner
                        .post(Task::new(
                            TaskKind::Standalone,
                            false,
                            QueueTarget::Same,
                            Box::pin(async move {
                                *landed.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
                                    crate::task::current_queue_index();
                            }),
                        ))
                        .unwrap();
                }),
            ))
            .unwrap();

        dispatcher.drain();
        assert_eq!(*landed_on.lock().unwrap(), Some(2));
    }

    #[test]
    fn post_io_runs_blocking_closure() {
        let dispatcher = Dispatcher::new(&DispatcherConfig::new(1, 2));
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        dispatcher
            .post_io(IoTask::new(
                false,
                QueueTarget::Any,
                Box::new(move || {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                }),
            ))
            .unwrap();

        dispatcher.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
