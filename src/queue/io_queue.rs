// Licensed under the MIT License.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::trace;

use crate::queue::parker::Parker;
use crate::task::IoTask;

const PARK_TIMEOUT: Duration = Duration::from_millis(5);

struct Shared {
    index: usize,
    high: Mutex<VecDeque<IoTask>>,
    normal: Mutex<VecDeque<IoTask>>,
    parker: Parker,
    draining: AtomicBool,
    terminated: AtomicBool,
}

/// One I/O worker's queue, backing either a dedicated queue (each worker has
/// its own `IoQueue` and `post` always targets it directly) or a
/// load-balanced shared queue (several workers service the same `IoQueue`,
/// and the dispatcher distributes across the pool's queues or a shared one
/// depending on configuration).
///
/// Unlike [`crate::queue::TaskQueue`], there is no run/wait split here: once
/// picked up, an `IoTask` runs to completion on its worker before the next
/// one is taken, since blocking I/O has no voluntary suspension point.
pub(crate) struct IoQueue {
    shared: Arc<Shared>,
}

impl Clone for IoQueue {
    /// Cheap: clones the `Arc`. Running `.run()` on several clones from
    /// separate worker threads is exactly how a "load-balanced shared I/O
    /// queue" is realized - the clones all drain the same underlying queue.
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl std::fmt::Debug for IoQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoQueue").field("index", &self.shared.index).finish()
    }
}

impl IoQueue {
    #[must_use]
    pub(crate) fn new(index: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                index,
                high: Mutex::new(VecDeque::new()),
                normal: Mutex::new(VecDeque::new()),
                parker: Parker::new(),
                draining: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub(crate) fn index(&self) -> usize {
        self.shared.index
    }

    pub(crate) fn post(&self, task: IoTask) {
        let mut queue = if task.high_priority() {
            self.shared.high.lock()
        } else {
            self.shared.normal.lock()
        }
        .unwrap_or_else(std::sync::PoisonError::into_inner);
        queue.push_back(task);
        drop(queue);
        self.shared.parker.notify();
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        let high = self.shared.high.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let normal = self.shared.normal.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        high.len() + normal.len()
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn begin_drain(&self) {
        self.shared.draining.store(true, Ordering::SeqCst);
        self.shared.parker.notify();
    }

    pub(crate) fn terminate(&self) {
        self.shared.terminated.store(true, Ordering::SeqCst);
        self.shared.parker.notify();
    }

    /// Runs this worker's service loop. Returns when terminated, or when
    /// draining and the queue has gone empty.
    pub(crate) fn run(&self) {
        loop {
            if self.shared.terminated.load(Ordering::SeqCst) {
                return;
            }

            let next = self.pop_next();
            let Some(task) = next else {
                if self.shared.draining.load(Ordering::SeqCst) && self.is_empty() {
                    return;
                }
                self.shared.parker.park(PARK_TIMEOUT);
                continue;
            };

            trace!(queue = self.shared.index, "running io task");
            task.run();
        }
    }

    fn pop_next(&self) -> Option<IoTask> {
        let mut high = self.shared.high.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(task) = high.pop_front() {
            return Some(task);
        }
        drop(high);
        let mut normal = self.shared.normal.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        normal.pop_front()
    }
}
