// Licensed under the MIT License.

use std::pin::Pin;

use crate::task::id::{next_task_id, TaskId};
use crate::task::types::{QueueTarget, TaskKind};

/// A runnable coroutine task queued on a [`crate::queue::TaskQueue`].
///
/// The "coroutine stack" is the boxed future itself: each `poll` is one
/// resume, and a `Poll::Pending` return is the moral equivalent of the
/// coroutine yielding control back to its worker.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) kind: TaskKind,
    pub(crate) high_priority: bool,
    pub(crate) target: QueueTarget,
    pub(crate) future: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Task {
    #[must_use]
    pub fn new(
        kind: TaskKind,
        high_priority: bool,
        target: QueueTarget,
        future: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> Self {
        Self {
            id: next_task_id(),
            kind,
            high_priority,
            target,
            future,
        }
    }

    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    #[must_use]
    pub const fn high_priority(&self) -> bool {
        self.high_priority
    }

    #[must_use]
    pub const fn target(&self) -> QueueTarget {
        self.target
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("high_priority", &self.high_priority)
            .finish()
    }
}
