// Licensed under the MIT License.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::dispatcher::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::queue::{AnyQueue, IoQueue, TaskQueue};
use crate::task::types::QueueTarget;
use crate::task::{IoTask, Task};

/// Holds the queue fabric and routes posts to it. Does not own worker
/// threads - those are spawned and joined by [`crate::dispatcher::Dispatcher`],
/// the cheap-clone handle that wraps an `Arc<DispatcherCore>`, mirroring the
/// split between a core that knows how to route work and a client handle
/// that is cheap to hand out to every task.
#[derive(Debug)]
pub(crate) struct DispatcherCore {
    coroutine_queues: Vec<Arc<TaskQueue>>,
    io_queues: Vec<IoQueue>,
    any: Option<Arc<AnyQueue>>,
    any_range: (usize, usize),
    sharing_for_any: bool,
    next_io_index: AtomicUsize,
    shutdown_started: AtomicBool,
    terminated: AtomicBool,
}

impl DispatcherCore {
    #[must_use]
    pub(crate) fn new(config: &DispatcherConfig) -> Self {
        let any = config.coro_sharing_for_any.then(|| Arc::new(AnyQueue::new()));

        let coroutine_queues = (0..config.num_coroutine_threads)
            .map(|index| {
                let in_range = index >= config.coro_queue_id_range_for_any.0
                    && index <= config.coro_queue_id_range_for_any.1;
                Arc::new(TaskQueue::new(index, if in_range { any.clone() } else { None }))
            })
            .collect();

        let io_queues = if config.load_balance_shared_io_queues {
            let shared = IoQueue::new(0);
            vec![shared; config.num_io_threads]
        } else {
            (0..config.num_io_threads).map(IoQueue::new).collect()
        };

        Self {
            coroutine_queues,
            io_queues,
            any,
            any_range: config.coro_queue_id_range_for_any,
            sharing_for_any: config.coro_sharing_for_any,
            next_io_index: AtomicUsize::new(0),
            shutdown_started: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub(crate) fn coroutine_queues(&self) -> &[Arc<TaskQueue>] {
        &self.coroutine_queues
    }

    #[must_use]
    pub(crate) fn io_queues(&self) -> &[IoQueue] {
        &self.io_queues
    }

    #[must_use]
    pub(crate) fn num_coroutine_threads(&self) -> usize {
        self.coroutine_queues.len()
    }

    #[must_use]
    pub(crate) fn num_io_threads(&self) -> usize {
        self.io_queues.len()
    }

    pub(crate) fn post(&self, task: Task, current_queue: Option<usize>) -> Result<()> {
        self.check_accepting()?;

        match task.target() {
            QueueTarget::Id(index) => {
                let queue = self
                    .coroutine_queues
                    .get(index)
                    .ok_or(Error::InvalidQueueId(index as i64))?;
                queue.post(task);
            }
            QueueTarget::Same => {
                if let Some(index) = current_queue {
                    self.coroutine_queues[index].post(task);
                } else {
                    self.post_any(task);
                }
            }
            QueueTarget::Any => self.post_any(task),
        }

        Ok(())
    }

    fn check_accepting(&self) -> Result<()> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(Error::Terminated);
        }
        if self.shutdown_started.load(Ordering::SeqCst) {
            return Err(Error::Draining);
        }
        Ok(())
    }

    fn post_any(&self, task: Task) {
        if self.sharing_for_any {
            if let Some(any) = &self.any {
                any.post(task);
                let (low, high) = self.any_range;
                for queue in &self.coroutine_queues[low..=high] {
                    queue.notify();
                }
                return;
            }
        }

        let (low, high) = self.any_range;
        let index = self.coroutine_queues[low..=high]
            .iter()
            .enumerate()
            .min_by_key(|(_, queue)| queue.len())
            .map_or(low, |(offset, _)| low + offset);
        self.coroutine_queues[index].post(task);
    }

    pub(crate) fn post_io(&self, task: IoTask) -> Result<()> {
        self.check_accepting()?;

        match task.target {
            QueueTarget::Id(index) => {
                let queue = self
                    .io_queues
                    .get(index)
                    .ok_or(Error::InvalidQueueId(index as i64))?;
                queue.post(task);
            }
            QueueTarget::Same | QueueTarget::Any => {
                let index = self.next_io_index.fetch_add(1, Ordering::Relaxed) % self.io_queues.len();
                self.io_queues[index].post(task);
            }
        }

        Ok(())
    }

    /// Stops accepting new work and signals every queue to drain. Idempotent.
    pub(crate) fn begin_drain(&self) {
        if self.shutdown_started.fetch_or(true, Ordering::SeqCst) {
            return;
        }
        for queue in &self.coroutine_queues {
            queue.begin_drain();
        }
        for queue in &self.io_queues {
            queue.begin_drain();
        }
    }

    /// Immediately stops every worker, abandoning any queued or in-flight
    /// work. Idempotent.
    pub(crate) fn terminate(&self) {
        self.shutdown_started.store(true, Ordering::SeqCst);
        self.terminated.store(true, Ordering::SeqCst);
        for queue in &self.coroutine_queues {
            queue.terminate();
        }
        for queue in &self.io_queues {
            queue.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::types::TaskKind;

    fn task(target: QueueTarget) -> Task {
        Task::new(TaskKind::Standalone, false, target, Box::pin(async {}))
    }

    #[test]
    fn post_to_invalid_id_is_an_error() {
        let config = DispatcherConfig::new(2, 1);
        let core = DispatcherCore::new(&config);
        let err = core.post(task(QueueTarget::Id(5)), None).unwrap_err();
        assert!(matches!(err, Error::InvalidQueueId(5)));
    }

    #[test]
    fn post_after_drain_is_rejected() {
        let config = DispatcherConfig::new(1, 1);
        let core = DispatcherCore::new(&config);
        core.begin_drain();
        let err = core.post(task(QueueTarget::Any), None).unwrap_err();
        assert!(matches!(err, Error::Draining));
    }

    #[test]
    fn any_post_picks_shortest_queue() {
        let config = DispatcherConfig::new(2, 1);
        let core = DispatcherCore::new(&config);
        core.post(task(QueueTarget::Id(0)), None).unwrap();
        core.post(task(QueueTarget::Any), None).unwrap();
        assert_eq!(core.coroutine_queues[1].len(), 1);
        assert_eq!(core.coroutine_queues[0].len(), 1);
    }
}
