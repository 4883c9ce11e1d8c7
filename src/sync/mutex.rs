// Licensed under the MIT License.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{self, Waker};

use crate::spinlock::SpinLock;

/// A yield-aware mutex.
///
/// `lock()` is an `async fn`: awaiting it suspends the calling task (if
/// called from inside one) rather than blocking its worker thread. Calling
/// [`Mutex::lock_blocking`] from a plain OS thread parks that thread via
/// `futures::executor::block_on`, which is the same "drive this future to
/// completion synchronously" idiom used for [`crate::future::Future::get`].
///
/// This mutex is not reentrant: locking it twice from the same task without
/// releasing in between deadlocks, by design (matching the non-reentrant
/// contract of the primitive it replaces).
pub struct Mutex<T> {
    locked: AtomicBool,
    waiters: SpinLock<VecDeque<Waker>>,
    data: UnsafeCell<T>,
}

// SAFETY: `data` is only reachable through `MutexGuard`, which exists only
// while `locked` is true and is unique (CAS-guarded).
unsafe impl<T: Send> Send for Mutex<T> {}
// SAFETY: see above.
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            waiters: SpinLock::new(VecDeque::new()),
            data: UnsafeCell::new(value),
        }
    }

    #[must_use]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|()| MutexGuard { mutex: self })
    }

    /// Acquires the lock, suspending the current task (or, from a plain
    /// thread, registering a waker that is never woken by anything but
    /// `unlock` - driven to completion by the blocking executor) until it is
    /// available.
    pub fn lock(&self) -> Lock<'_, T> {
        Lock { mutex: self }
    }

    /// Blocking variant of [`Mutex::lock`] for callers outside a task.
    #[must_use]
    pub fn lock_blocking(&self) -> MutexGuard<'_, T> {
        futures::executor::block_on(self.lock())
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        if let Some(waker) = self.waiters.lock().pop_front() {
            waker.wake();
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.locked.load(Ordering::Relaxed))
            .finish()
    }
}

/// Future returned by [`Mutex::lock`].
#[must_use = "futures do nothing unless polled or awaited"]
pub struct Lock<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<'a, T> Future for Lock<'a, T> {
    type Output = MutexGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        if let Some(guard) = self.mutex.try_lock() {
            return task::Poll::Ready(guard);
        }
        // Register before re-checking, to not miss a concurrent unlock.
        self.mutex.waiters.lock().push_back(cx.waker().clone());
        if let Some(guard) = self.mutex.try_lock() {
            return task::Poll::Ready(guard);
        }
        task::Poll::Pending
    }
}

pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the guard implies `locked == true`, set exclusively by CAS.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

impl<'a, T> MutexGuard<'a, T> {
    /// Exposes the guard's mutex, used by [`crate::sync::CondVar::wait`] to
    /// release and later reacquire the same lock.
    #[must_use]
    pub(crate) const fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }

    /// Releases this guard's mutex for the lifetime of the returned
    /// [`ReverseGuard`], reacquiring it (blocking the caller if necessary)
    /// once that guard drops. `self` stays borrowed until then, so the data
    /// behind it cannot be touched while the mutex is unlocked.
    #[must_use]
    pub fn reverse(&mut self) -> ReverseGuard<'_, 'a, T> {
        self.mutex.unlock();
        ReverseGuard { guard: self }
    }
}

/// Scope guard returned by [`MutexGuard::reverse`]. The mutex is unlocked for
/// as long as this value is alive and reacquired when it drops.
pub struct ReverseGuard<'g, 'a, T> {
    guard: &'g mut MutexGuard<'a, T>,
}

impl<T> Drop for ReverseGuard<'_, '_, T> {
    fn drop(&mut self) {
        // The reacquired guard is only a vehicle for the blocking wait; the
        // outer `MutexGuard` we borrowed from is what unlocks on its own
        // drop, so forget this one rather than let it unlock immediately.
        std::mem::forget(self.guard.mutex.lock_blocking());
    }
}
