// Licensed under the MIT License.

use std::pin::Pin;
use std::task;

/// When polled, yields the current task back to its worker so a different
/// task may run, then completes on the following poll.
///
/// This is the coroutine-side realization of the "yield" suspension point:
/// the worker's poll loop stands in for the caller side of the classic
/// coroutine stack switch, and `YieldFuture` is the callee side.
#[derive(Debug)]
pub struct YieldFuture {
    first_poll_completed: bool,
}

impl YieldFuture {
    pub(crate) const fn new() -> Self {
        Self {
            first_poll_completed: false,
        }
    }
}

impl Future for YieldFuture {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        if self.first_poll_completed {
            task::Poll::Ready(())
        } else {
            self.first_poll_completed = true;
            cx.waker().wake_by_ref();
            task::Poll::Pending
        }
    }
}

/// Yields once. Called from outside a polled task (no coroutine context to
/// suspend), this degrades to an OS-thread yield.
pub fn yield_now() -> YieldFuture {
    YieldFuture::new()
}

#[cfg(test)]
mod tests {
    use futures::task::noop_waker_ref;

    use super::*;

    #[test]
    fn yield_future_pends_once_then_completes() {
        let mut future = Box::pin(YieldFuture::new());
        let mut cx = task::Context::from_waker(noop_waker_ref());

        assert_eq!(future.as_mut().poll(&mut cx), task::Poll::Pending);
        assert_eq!(future.as_mut().poll(&mut cx), task::Poll::Ready(()));
    }
}
