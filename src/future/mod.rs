// Licensed under the MIT License.

//! Futures and promises: the one-shot (or streaming) value channel between a
//! task and whoever holds its `Future`.
//!
//! [`SharedState`] is the backing store, grounded on the same one-shot-event
//! state machine idiom the teacher crate uses for its join handles, extended
//! with a waiter list, stored exception, and an optional streaming buffer per
//! the richer contract this engine needs.

mod shared_state;

pub use shared_state::{FutureErrorKind, Status};

use std::sync::Arc;

use shared_state::SharedStateInner;

/// Creates a one-shot (promise, future) pair.
#[must_use]
pub fn channel<T>() -> (Promise<T>, Future<T>) {
    let inner = Arc::new(SharedStateInner::new_one_shot());
    (
        Promise {
            inner: Arc::clone(&inner),
        },
        Future { inner },
    )
}

/// Creates a streaming (promise, future) pair: `push`/`close_buffer` on the
/// promise side, `pull` on the future side.
#[must_use]
pub fn stream_channel<T>() -> (Promise<T>, Future<T>) {
    let inner = Arc::new(SharedStateInner::new_stream());
    (
        Promise {
            inner: Arc::clone(&inner),
        },
        Future { inner },
    )
}

/// The write side of a [`Future`].
#[derive(Debug)]
pub struct Promise<T> {
    inner: Arc<SharedStateInner<T>>,
}

impl<T> Promise<T> {
    /// Satisfies the future with `value`. Panics (debug) if already set;
    /// see [`SharedStateInner::set`] for the exact contract.
    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    pub fn set_exception(&self, error: Box<dyn std::error::Error + Send + Sync>) {
        self.inner.set_exception(error);
    }

    /// Appends `value` to the stream without closing it.
    pub fn push(&self, value: T) {
        self.inner.push(value);
    }

    /// Marks the stream closed; no more values may be pushed.
    pub fn close_buffer(&self) {
        self.inner.close_buffer();
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        self.inner.break_if_unsatisfied();
    }
}

/// The read side of a [`Promise`].
#[derive(Debug)]
pub struct Future<T> {
    inner: Arc<SharedStateInner<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Future<T> {
    /// Waits for the value, consuming it. A second call returns
    /// [`FutureErrorKind::FutureAlreadyRetrieved`].
    pub async fn get(&self) -> Result<T, FutureErrorKind> {
        self.inner.get().await
    }

    /// Waits for the value without consuming it; repeatable.
    pub async fn get_ref(&self) -> Result<T, FutureErrorKind> {
        self.inner.get_ref().await
    }

    /// Blocking variant of [`Future::get`] for callers outside a task.
    pub fn get_blocking(&self) -> Result<T, FutureErrorKind> {
        crate::non_blocking_thread::assert_not_flagged();
        futures::executor::block_on(self.get())
    }

    /// Waits up to `timeout` for the value.
    pub async fn wait_for(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Option<T>, FutureErrorKind> {
        self.inner.wait_for(timeout).await
    }

    /// Waits for and removes the next streamed element, or `None` once the
    /// stream is closed and drained.
    pub async fn pull(&self) -> Result<Option<T>, FutureErrorKind> {
        self.inner.pull().await
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.inner.valid()
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.status()
    }
}
