// Licensed under the MIT License.

//! Thread-local record of which coroutine-worker queue, if any, is polling a
//! task on the current OS thread. Lets `QueueTarget::Same` resolve to the
//! queue a task is already running on - the Rust-native stand-in for
//! installing a yield handle on the task's own context (see `SPEC_FULL.md`
//! §4.3).

use std::cell::Cell;

thread_local! {
    static CURRENT_QUEUE: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The coroutine-worker queue index currently polling a task on this thread,
/// or `None` outside a worker's poll loop (I/O-worker threads and ordinary
/// application threads included).
pub(crate) fn current_queue_index() -> Option<usize> {
    CURRENT_QUEUE.with(Cell::get)
}

/// Installs `index` as the current queue for this guard's lifetime, restoring
/// whatever was there before on drop. [`crate::queue::TaskQueue`] holds one of
/// these for the duration of each poll.
pub(crate) struct CurrentQueueGuard {
    previous: Option<usize>,
}

impl CurrentQueueGuard {
    #[must_use]
    pub(crate) fn set(index: usize) -> Self {
        let previous = CURRENT_QUEUE.with(|c| c.replace(Some(index)));
        Self { previous }
    }
}

impl Drop for CurrentQueueGuard {
    fn drop(&mut self) {
        CURRENT_QUEUE.with(|c| c.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_by_default() {
        assert_eq!(current_queue_index(), None);
    }

    #[test]
    fn guard_sets_and_restores() {
        assert_eq!(current_queue_index(), None);
        {
            let _guard = CurrentQueueGuard::set(3);
            assert_eq!(current_queue_index(), Some(3));
        }
        assert_eq!(current_queue_index(), None);
    }

    #[test]
    fn nested_guards_restore_outer_value() {
        let _outer = CurrentQueueGuard::set(1);
        {
            let _inner = CurrentQueueGuard::set(2);
            assert_eq!(current_queue_index(), Some(2));
        }
        assert_eq!(current_queue_index(), Some(1));
    }
}
