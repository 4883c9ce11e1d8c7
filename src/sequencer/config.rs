// Licensed under the MIT License.

use std::any::Any;
use std::sync::Arc;

use crate::task::chain::TaskError;

/// `(exception, opaque) -> void`, invoked whenever a sequencer-scheduled task
/// (keyed or universal) completes with an error.
pub type ExceptionCallback = Arc<dyn Fn(&TaskError, Option<&(dyn Any + Send + Sync)>) + Send + Sync>;

/// Construction-time configuration for a [`crate::sequencer::Sequencer`].
#[derive(Clone)]
pub struct SequencerConfig {
    /// Number of hash buckets backing the per-key tracking table. Keys are
    /// sharded across buckets by hash to keep per-key lookups from
    /// contending on a single lock; this does not bound the number of
    /// distinct keys the sequencer can track at once.
    pub num_buckets: usize,

    /// Invoked with the task's error and the opaque pointer below whenever a
    /// keyed or universal task completes with an exception. `None` disables
    /// the hook (the error still flows into the task's own promise either
    /// way, via `set_exception`).
    pub(crate) exception_callback: Option<ExceptionCallback>,

    /// User-owned value handed back to `exception_callback` verbatim on
    /// every invocation.
    pub(crate) opaque: Option<Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for SequencerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerConfig")
            .field("num_buckets", &self.num_buckets)
            .field("exception_callback", &self.exception_callback.is_some())
            .field("opaque", &self.opaque.is_some())
            .finish()
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            num_buckets: 64,
            exception_callback: None,
            opaque: None,
        }
    }
}

impl SequencerConfig {
    #[must_use]
    pub fn new(num_buckets: usize) -> Self {
        Self {
            num_buckets,
            ..Self::default()
        }
    }

    /// Registers a callback invoked with `(exception, opaque)` whenever a
    /// task scheduled through this sequencer fails. `opaque` is handed back
    /// verbatim on every call.
    #[must_use]
    pub fn with_exception_callback<F>(mut self, callback: F, opaque: Option<Arc<dyn Any + Send + Sync>>) -> Self
    where
        F: Fn(&TaskError, Option<&(dyn Any + Send + Sync)>) + Send + Sync + 'static,
    {
        self.exception_callback = Some(Arc::new(callback));
        self.opaque = opaque;
        self
    }
}
