// Licensed under the MIT License.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

/// A boxed, ready-to-run job: the per-key or barrier body plus everything it
/// needs to resolve its own promise, erased to a uniform `FnOnce`.
pub(crate) type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Per-key bookkeeping: whether a task for this key is currently running
/// (holding the sequencer's read-side gate) and, if so, what is queued up
/// behind it. Removed from its bucket entirely once the queue drains, so the
/// tracking table only ever holds genuinely active keys.
///
/// `posted` is a lifetime counter (never decremented); `pending()` is a
/// point-in-time count of work not yet completed for this key.
#[derive(Default)]
pub(crate) struct KeyRecord {
    pub(crate) queue: VecDeque<Job>,
    pub(crate) running: bool,
    pub(crate) posted: u64,
}

impl KeyRecord {
    pub(crate) fn pending(&self) -> u64 {
        self.queue.len() as u64 + u64::from(self.running)
    }
}

/// A snapshot of one key's statistics, returned by
/// [`crate::sequencer::Sequencer::key_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyStats {
    /// Total number of tasks ever enqueued under this key.
    pub posted: u64,
    /// Number of tasks for this key currently running or queued.
    pub pending: u64,
}
