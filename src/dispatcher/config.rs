// Licensed under the MIT License.

/// Construction-time configuration for a [`crate::dispatcher::Dispatcher`].
///
/// Thread pinning/naming and a dedicated background rebalancing thread for
/// the "any" queue range are both out of scope for this engine (see
/// `DESIGN.md`): the fairness goal they serve is instead met by picking the
/// shortest queue in range at post time, which needs no extra thread.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of coroutine-worker threads, each running its own
    /// [`crate::queue::TaskQueue`].
    pub num_coroutine_threads: usize,

    /// Number of I/O-worker threads.
    pub num_io_threads: usize,

    /// When `true`, all I/O workers service one shared `IoQueue` instead of
    /// each owning a dedicated one.
    pub load_balance_shared_io_queues: bool,

    /// When `true`, `QueueTarget::Any` posts land on a shared coroutine
    /// bucket that idle workers in `coro_queue_id_range_for_any` steal from.
    /// When `false`, the dispatcher instead posts directly to whichever
    /// queue in that range currently has the fewest outstanding tasks.
    pub coro_sharing_for_any: bool,

    /// Inclusive `(low, high)` coroutine-queue index range eligible to
    /// receive `QueueTarget::Any` posts.
    pub coro_queue_id_range_for_any: (usize, usize),
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let num_coroutine_threads = std::thread::available_parallelism()
            .map_or(4, std::num::NonZeroUsize::get)
            .max(1);

        Self {
            num_coroutine_threads,
            num_io_threads: num_coroutine_threads,
            load_balance_shared_io_queues: false,
            coro_sharing_for_any: false,
            coro_queue_id_range_for_any: (0, num_coroutine_threads.saturating_sub(1)),
        }
    }
}

impl DispatcherConfig {
    #[must_use]
    pub fn new(num_coroutine_threads: usize, num_io_threads: usize) -> Self {
        Self {
            num_coroutine_threads,
            num_io_threads,
            coro_queue_id_range_for_any: (0, num_coroutine_threads.saturating_sub(1)),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_shared_io_queues(mut self, shared: bool) -> Self {
        self.load_balance_shared_io_queues = shared;
        self
    }

    #[must_use]
    pub const fn with_any_sharing(mut self, sharing: bool) -> Self {
        self.coro_sharing_for_any = sharing;
        self
    }

    #[must_use]
    pub const fn with_any_range(mut self, low: usize, high: usize) -> Self {
        self.coro_queue_id_range_for_any = (low, high);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_any_range_spans_all_coroutine_threads() {
        let config = DispatcherConfig::new(4, 2);
        assert_eq!(config.coro_queue_id_range_for_any, (0, 3));
    }
}
