// Licensed under the MIT License.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::task::{waker, ArcWake};
use tracing::trace;

use crate::queue::any_queue::AnyQueue;
use crate::queue::parker::Parker;
use crate::task::Task;

/// Backlog park timeout: how long a worker sleeps when both its own queues
/// and the shared "any" bucket (if any) are empty. Bounded so a task posted
/// right after the check is still picked up promptly.
const PARK_TIMEOUT: Duration = Duration::from_millis(5);

/// A task that has been handed to the run queue at least once. Kept alive by
/// an `Arc` so that the waker produced for it can outlive the poll that
/// created it; [`ArcWake::wake_by_ref`] is how a pending task gets back onto
/// the run queue after the event it was waiting for occurs.
struct Slot {
    future: Mutex<Option<Pin<Box<dyn Future<Output = ()> + Send>>>>,
    high_priority: bool,
    shared: Weak<Shared>,
}

impl ArcWake for Slot {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let Some(shared) = arc_self.shared.upgrade() else {
            return;
        };
        shared.requeue(Arc::clone(arc_self));
    }
}

struct Shared {
    index: usize,
    wait: Mutex<VecDeque<Task>>,
    run: Mutex<VecDeque<Arc<Slot>>>,
    parker: Parker,
    draining: AtomicBool,
    terminated: AtomicBool,
    any: Option<Arc<AnyQueue>>,
}

impl Shared {
    fn requeue(&self, slot: Arc<Slot>) {
        let mut run = self.run.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.high_priority {
            run.push_front(slot);
        } else {
            run.push_back(slot);
        }
        drop(run);
        self.parker.notify();
    }
}

/// One coroutine-worker's queue pair (wait queue + run queue) and the poll
/// loop that services it.
///
/// # Thread safety
///
/// Posting is safe from any thread. The poll loop itself must only ever run
/// on the single worker thread that owns this queue.
pub(crate) struct TaskQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").field("index", &self.shared.index).finish()
    }
}

impl TaskQueue {
    #[must_use]
    pub(crate) fn new(index: usize, any: Option<Arc<AnyQueue>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                index,
                wait: Mutex::new(VecDeque::new()),
                run: Mutex::new(VecDeque::new()),
                parker: Parker::new(),
                draining: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                any,
            }),
        }
    }

    #[must_use]
    pub(crate) fn index(&self) -> usize {
        self.shared.index
    }

    /// Queues a task for this worker. High-priority tasks join the wait
    /// queue at the front so they splice in ahead of everything already
    /// waiting; normal tasks join at the back.
    pub(crate) fn post(&self, task: Task) {
        let high_priority = task.high_priority();
        let mut wait = self.shared.wait.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if high_priority {
            wait.push_front(task);
        } else {
            wait.push_back(task);
        }
        drop(wait);
        self.shared.parker.notify();
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        let wait = self.shared.wait.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let run = self.shared.run.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        wait.len() + run.len()
    }

    pub(crate) fn begin_drain(&self) {
        self.shared.draining.store(true, Ordering::SeqCst);
        self.shared.parker.notify();
    }

    pub(crate) fn terminate(&self) {
        self.shared.terminated.store(true, Ordering::SeqCst);
        self.shared.parker.notify();
    }

    /// Wakes this worker without posting anything. Used after a task lands
    /// on the shared "any" bucket rather than this queue's own wait queue,
    /// since a bucket push does not otherwise ring any one worker's bell.
    pub(crate) fn notify(&self) {
        self.shared.parker.notify();
    }

    /// Runs the worker's poll loop. Returns when terminated, or when draining
    /// and both queues (and the shared "any" bucket, if attached) go empty.
    pub(crate) fn run(&self) {
        loop {
            if self.shared.terminated.load(Ordering::SeqCst) {
                return;
            }

            self.splice_wait_queue();

            let next = {
                let mut run = self.shared.run.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                run.pop_front()
            };

            let Some(slot) = next.or_else(|| self.steal_from_any()) else {
                if self.shared.draining.load(Ordering::SeqCst) && self.is_idle() {
                    return;
                }
                self.shared.parker.park(PARK_TIMEOUT);
                continue;
            };

            self.poll_slot(&slot);
        }
    }

    fn is_idle(&self) -> bool {
        let wait = self.shared.wait.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let run = self.shared.run.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        wait.is_empty() && run.is_empty() && self.shared.any.as_ref().is_none_or(|a| a.is_empty())
    }

    fn splice_wait_queue(&self) {
        let mut wait = self.shared.wait.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if wait.is_empty() {
            return;
        }
        let drained: Vec<Task> = wait.drain(..).collect();
        drop(wait);

        let mut run = self.shared.run.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for task in drained {
            let slot = Arc::new(Slot {
                future: Mutex::new(Some(task.future)),
                high_priority: task.high_priority,
                shared: Arc::downgrade(&self.shared),
            });
            run.push_back(slot);
        }
    }

    fn steal_from_any(&self) -> Option<Arc<Slot>> {
        let any = self.shared.any.as_ref()?;
        let task = any.steal()?;
        Some(Arc::new(Slot {
            future: Mutex::new(Some(task.future)),
            high_priority: task.high_priority,
            shared: Arc::downgrade(&self.shared),
        }))
    }

    fn poll_slot(&self, slot: &Arc<Slot>) {
        let mut guard = slot.future.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(mut future) = guard.take() else {
            return;
        };

        let w = waker(Arc::clone(slot));
        let mut cx = Context::from_waker(&w);
        let _current = crate::task::CurrentQueueGuard::set(self.shared.index);

        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                trace!(queue = self.shared.index, "task completed");
            }
            Poll::Pending => {
                *guard = Some(future);
            }
        }
    }
}
