// Licensed under the MIT License.

use std::sync::Arc;

use crate::sequencer::key_record::Job;
use crate::sequencer::Inner;

/// Builds the coroutine body that drains one key's backlog.
///
/// Acquires the sequencer's read-side gate exactly once and holds it for the
/// entire drain, so a [`crate::sequencer::Sequencer::barrier`] waiting on the
/// write side only has to wait for keys that were already running, never for
/// ones that start after it began waiting (the gate itself enforces that).
/// Runs `first` and then whatever else was queued for this key by the time
/// each job completes, in the order it was queued, until the key's backlog
/// is empty - at which point the key record is retired.
pub(crate) fn key_drain_body(
    inner: Arc<Inner>,
    bucket_index: usize,
    key_hash: u64,
    first: Job,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _permit = inner.gate.read().await;

        let mut next = Some(first);
        while let Some(job) = next.take() {
            job().await;
            next = inner.pop_or_retire(bucket_index, key_hash);
        }
    }
}
