// Licensed under the MIT License.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::task::Task;

/// The shared coroutine bucket used when a dispatcher is configured with
/// sharing enabled for `QueueTarget::Any` posts.
///
/// With sharing enabled, every `Any`-targeted task lands here instead of on
/// a specific worker's wait queue, and idle workers in the configured range
/// steal from it (first-come, FIFO within the bucket). With sharing
/// disabled, the dispatcher instead picks the shortest queue in range at
/// post time and this type is unused.
pub(crate) struct AnyQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl std::fmt::Debug for AnyQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.debug_struct("AnyQueue").field("len", &tasks.len()).finish()
    }
}

impl AnyQueue {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn post(&self, task: Task) {
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if task.high_priority() {
            tasks.push_front(task);
        } else {
            tasks.push_back(task);
        }
    }

    pub(crate) fn steal(&self) -> Option<Task> {
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.pop_front()
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        let tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.is_empty()
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::types::QueueTarget;
    use crate::task::types::TaskKind;

    fn task() -> Task {
        Task::new(TaskKind::Standalone, false, QueueTarget::Any, Box::pin(async {}))
    }

    #[test]
    fn steal_returns_fifo_order() {
        let any = AnyQueue::new();
        any.post(task());
        any.post(task());
        assert!(any.steal().is_some());
        assert!(any.steal().is_some());
        assert!(any.steal().is_none());
    }

    #[test]
    fn high_priority_post_jumps_the_queue() {
        let any = AnyQueue::new();
        any.post(task());
        any.post(Task::new(TaskKind::Standalone, true, QueueTarget::Any, Box::pin(async {})));
        let first = any.steal().unwrap();
        assert!(first.high_priority());
    }
}
