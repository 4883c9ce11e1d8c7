// Licensed under the MIT License.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::task::cls::Cls;
use crate::task::id::TaskId;
use crate::yielding::YieldFuture;

/// Handle a running task's body receives as its first argument.
///
/// Exposes the cooperative suspension points (`yield_now`, `sleep`), the
/// task's identity, and its coroutine-local storage. Blocking on a
/// synchronization primitive or a future is done directly by `.await`-ing
/// the primitive, not through this handle.
#[derive(Debug, Clone)]
pub struct TaskContext {
    id: TaskId,
    queue_index: Option<usize>,
    cls: Arc<Cls>,
}

impl TaskContext {
    #[must_use]
    pub(crate) fn new(id: TaskId, queue_index: Option<usize>) -> Self {
        Self {
            id,
            queue_index,
            cls: Arc::new(Cls::new()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The coroutine-worker queue this task is pinned to, or `None` for a
    /// task running on an I/O worker or outside the dispatcher entirely.
    #[must_use]
    pub const fn queue_index(&self) -> Option<usize> {
        self.queue_index
    }

    #[must_use]
    pub fn cls(&self) -> &Cls {
        &self.cls
    }

    /// Suspends the task, letting its worker run other tasks, then resumes.
    pub async fn yield_now(&self) {
        YieldFuture::new().await;
    }

    /// Suspends the task until `duration` has elapsed. Implemented as a
    /// cooperative poll against a deadline (there is no dedicated I/O-driven
    /// timer in this engine - see `DESIGN.md`), so actual wakeups are no
    /// finer-grained than the scheduling sweep of the owning worker.
    pub async fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            self.yield_now().await;
        }
    }
}
