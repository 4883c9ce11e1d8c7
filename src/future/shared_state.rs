// Licensed under the MIT License.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{self, Waker};
use std::time::{Duration, Instant};

use crate::yielding::YieldFuture;

/// Observable state of a [`crate::future::Future`]/[`crate::future::Promise`]
/// pair, matching the state names used by the contract this channel
/// implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unsatisfied,
    Satisfied,
    BufferingData,
    BufferClosed,
    BrokenPromise,
    Retrieved,
}

/// Why a read of a [`crate::future::Future`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FutureErrorKind {
    #[error("future has no backing shared state")]
    NoState,
    #[error("promise was already satisfied")]
    PromiseAlreadySatisfied,
    #[error("promise has not been satisfied yet")]
    PromiseNotSatisfied,
    #[error("future was already retrieved")]
    FutureAlreadyRetrieved,
    #[error("promise was dropped without being satisfied")]
    BrokenPromise,
    #[error("stream is still buffering data")]
    BufferingData,
    #[error("stream buffer is closed")]
    BufferClosed,
}

struct State<T> {
    value: Option<T>,
    error: Option<std::sync::Arc<dyn std::error::Error + Send + Sync>>,
    buffer: VecDeque<T>,
    is_stream: bool,
    closed: bool,
    retrieved: bool,
    broken: bool,
    wakers: Vec<Waker>,
}

impl<T> State<T> {
    fn status(&self) -> Status {
        if self.retrieved {
            return Status::Retrieved;
        }
        if self.broken {
            return Status::BrokenPromise;
        }
        if self.is_stream {
            return if self.closed {
                Status::BufferClosed
            } else if self.buffer.is_empty() {
                Status::Unsatisfied
            } else {
                Status::BufferingData
            };
        }
        if self.value.is_some() || self.error.is_some() {
            Status::Satisfied
        } else {
            Status::Unsatisfied
        }
    }

    fn wake_all(&mut self) {
        for w in self.wakers.drain(..) {
            w.wake();
        }
    }
}

pub(crate) struct SharedStateInner<T> {
    state: Mutex<State<T>>,
}

impl<T> std::fmt::Debug for SharedStateInner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self
            .state
            .lock()
            .map(|s| s.status())
            .unwrap_or(Status::BrokenPromise);
        f.debug_struct("SharedStateInner").field("status", &status).finish()
    }
}

impl<T> SharedStateInner<T> {
    pub(crate) fn new_one_shot() -> Self {
        Self {
            state: Mutex::new(State {
                value: None,
                error: None,
                buffer: VecDeque::new(),
                is_stream: false,
                closed: false,
                retrieved: false,
                broken: false,
                wakers: Vec::new(),
            }),
        }
    }

    pub(crate) fn new_stream() -> Self {
        Self {
            state: Mutex::new(State {
                value: None,
                error: None,
                buffer: VecDeque::new(),
                is_stream: true,
                closed: false,
                retrieved: false,
                broken: false,
                wakers: Vec::new(),
            }),
        }
    }

    pub(crate) fn set(&self, value: T) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(
            state.value.is_none() && state.error.is_none(),
            "promise already satisfied"
        );
        state.value = Some(value);
        state.wake_all();
    }

    pub(crate) fn set_exception(&self, error: Box<dyn std::error::Error + Send + Sync>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.error = Some(std::sync::Arc::from(error));
        state.wake_all();
    }

    pub(crate) fn push(&self, value: T) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(state.is_stream, "push called on a one-shot shared state");
        debug_assert!(!state.closed, "push called after close_buffer");
        state.buffer.push_back(value);
        state.wake_all();
    }

    pub(crate) fn close_buffer(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
        state.wake_all();
    }

    pub(crate) fn break_if_unsatisfied(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let unsatisfied = !state.is_stream && state.value.is_none() && state.error.is_none();
        let stream_unclosed = state.is_stream && !state.closed;
        if (unsatisfied || stream_unclosed) && !state.retrieved {
            state.broken = true;
            state.wake_all();
        }
    }

    pub(crate) fn valid(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !state.retrieved
    }

    pub(crate) fn status(&self) -> Status {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).status()
    }
}

impl<T: Clone> SharedStateInner<T> {
    pub(crate) async fn get(&self) -> Result<T, FutureErrorKind> {
        GetOnce { inner: self, take: true }.await
    }

    pub(crate) async fn get_ref(&self) -> Result<T, FutureErrorKind> {
        GetOnce { inner: self, take: false }.await
    }

    pub(crate) async fn wait_for(&self, timeout: Duration) -> Result<Option<T>, FutureErrorKind> {
        if timeout.is_zero() {
            return Ok(self.try_take_ready(false));
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(v) = self.try_take_ready(false) {
                return Ok(Some(v));
            }
            if let Some(err) = self.take_error_if_any() {
                return Err(err);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            YieldFuture::new().await;
        }
    }

    pub(crate) async fn pull(&self) -> Result<Option<T>, FutureErrorKind> {
        PullOnce { inner: self }.await
    }

    fn try_take_ready(&self, consume: bool) -> Option<T> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.value.is_some() {
            if consume {
                state.retrieved = true;
                return state.value.take();
            }
            return state.value.clone();
        }
        None
    }

    fn take_error_if_any(&self) -> Option<FutureErrorKind> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.error.is_some() {
            Some(FutureErrorKind::PromiseNotSatisfied)
        } else {
            None
        }
    }
}

struct GetOnce<'a, T> {
    inner: &'a SharedStateInner<T>,
    take: bool,
}

impl<T: Clone> Future for GetOnce<'_, T> {
    type Output = Result<T, FutureErrorKind>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.retrieved && self.take {
            return task::Poll::Ready(Err(FutureErrorKind::FutureAlreadyRetrieved));
        }
        if let Some(error) = state.error.clone() {
            if self.take {
                state.retrieved = true;
            }
            return task::Poll::Ready(Err(classify_error(&error)));
        }
        if let Some(value) = &state.value {
            let value = value.clone();
            if self.take {
                state.retrieved = true;
            }
            return task::Poll::Ready(Ok(value));
        }
        if state.broken {
            return task::Poll::Ready(Err(FutureErrorKind::BrokenPromise));
        }

        state.wakers.push(cx.waker().clone());
        task::Poll::Pending
    }
}

struct PullOnce<'a, T> {
    inner: &'a SharedStateInner<T>,
}

impl<T> Future for PullOnce<'_, T> {
    type Output = Result<Option<T>, FutureErrorKind>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(state.is_stream, "pull called on a one-shot shared state");

        if let Some(v) = state.buffer.pop_front() {
            return task::Poll::Ready(Ok(Some(v)));
        }
        if state.closed {
            return task::Poll::Ready(Ok(None));
        }
        if state.broken {
            return task::Poll::Ready(Err(FutureErrorKind::BrokenPromise));
        }

        state.wakers.push(cx.waker().clone());
        task::Poll::Pending
    }
}

fn classify_error(_error: &std::sync::Arc<dyn std::error::Error + Send + Sync>) -> FutureErrorKind {
    // The user's task-level error is surfaced as-is by the dispatcher's
    // chain walker; at the plain future-read layer we only distinguish
    // "an exception is present" from the structural statuses above.
    FutureErrorKind::PromiseNotSatisfied
}

#[cfg(test)]
mod tests {
    use super::super::{channel, stream_channel};
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        futures::executor::block_on(async {
            let (promise, future) = channel::<i32>();
            promise.set(33);
            assert_eq!(future.get().await, Ok(33));
        });
    }

    #[test]
    fn second_get_is_already_retrieved() {
        futures::executor::block_on(async {
            let (promise, future) = channel::<i32>();
            promise.set(1);
            assert_eq!(future.get().await, Ok(1));
            assert_eq!(
                future.get().await,
                Err(FutureErrorKind::FutureAlreadyRetrieved)
            );
        });
    }

    #[test]
    fn get_ref_is_repeatable() {
        futures::executor::block_on(async {
            let (promise, future) = channel::<i32>();
            promise.set(9);
            assert_eq!(future.get_ref().await, Ok(9));
            assert_eq!(future.get_ref().await, Ok(9));
            assert_eq!(future.status(), Status::Satisfied);
        });
    }

    #[test]
    fn errored_future_is_already_retrieved_on_second_get() {
        futures::executor::block_on(async {
            let (promise, future) = channel::<i32>();
            promise.set_exception("boom".into());
            assert!(future.get().await.is_err());
            assert_eq!(
                future.get().await,
                Err(FutureErrorKind::FutureAlreadyRetrieved)
            );
        });
    }

    #[test]
    fn dropped_promise_breaks_future() {
        futures::executor::block_on(async {
            let (promise, future) = channel::<i32>();
            drop(promise);
            assert_eq!(future.get().await, Err(FutureErrorKind::BrokenPromise));
        });
    }

    #[test]
    fn stream_push_pull_and_close() {
        futures::executor::block_on(async {
            let (promise, future) = stream_channel::<i32>();
            promise.push(1);
            promise.push(2);
            promise.close_buffer();

            assert_eq!(future.pull().await, Ok(Some(1)));
            assert_eq!(future.pull().await, Ok(Some(2)));
            assert_eq!(future.pull().await, Ok(None));
        });
    }
}
