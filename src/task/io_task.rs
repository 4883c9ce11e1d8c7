// Licensed under the MIT License.

use crate::task::id::{next_task_id, TaskId};
use crate::task::types::QueueTarget;

/// A blocking unit of work run to completion on an I/O worker thread.
///
/// Unlike [`crate::task::Task`], an `IoTask` has no continuation chain and
/// no voluntary suspension point: once picked up by a worker it holds that
/// worker until the closure returns.
pub struct IoTask {
    pub(crate) id: TaskId,
    pub(crate) high_priority: bool,
    pub(crate) target: QueueTarget,
    pub(crate) body: Box<dyn FnOnce() + Send>,
}

impl IoTask {
    #[must_use]
    pub fn new(high_priority: bool, target: QueueTarget, body: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            id: next_task_id(),
            high_priority,
            target,
            body,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub const fn high_priority(&self) -> bool {
        self.high_priority
    }

    pub fn run(self) {
        (self.body)();
    }
}

impl std::fmt::Debug for IoTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoTask")
            .field("id", &self.id)
            .field("high_priority", &self.high_priority)
            .finish()
    }
}
