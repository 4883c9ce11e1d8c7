// Licensed under the MIT License.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{self, Waker};

// The word packs (pending_writers: i32 high, owners: i32 low) into one i64 so
// every transition is a single compare-exchange, the same trick
// `crate::spinlock::RwSpinLock` uses for `(pending_upgrades, owners)`.
// `owners >= 0` means that many readers hold the lock; `owners == -1` means a
// writer holds it.
const OWNERS_MASK: i64 = 0xFFFF_FFFF;
const WRITER: i32 = -1;

fn pack(pending_writers: i32, owners: i32) -> i64 {
    (i64::from(pending_writers) << 32) | (i64::from(owners as u32))
}

fn unpack(word: i64) -> (i32, i32) {
    let pending = (word >> 32) as i32;
    let owners = (word & OWNERS_MASK) as i32;
    (pending, owners)
}

/// A yield-aware reader/writer mutex, built the same way as [`crate::sync::Mutex`]:
/// an atomic fast-path check plus a waker queue for the slow path, so a
/// coroutine task suspends on contention rather than blocking its worker.
///
/// Tracks the number of writers currently registered as waiting
/// (`pending_writers`) alongside the reader/writer owner count, mirroring
/// [`crate::spinlock::RwSpinLock`]'s packed state machine: once a writer has
/// registered, new readers are refused until it has run, so a writer cannot
/// be starved by a steady stream of readers arriving after it.
pub struct RwMutex<T> {
    state: AtomicI64,
    waiters: crate::spinlock::SpinLock<VecDeque<Waker>>,
    data: UnsafeCell<T>,
}

// SAFETY: `data` is reachable only while `state` grants shared or exclusive
// ownership, enforced by the CAS loops below.
unsafe impl<T: Send> Send for RwMutex<T> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for RwMutex<T> {}

impl<T> RwMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicI64::new(0),
            waiters: crate::spinlock::SpinLock::new(VecDeque::new()),
            data: UnsafeCell::new(value),
        }
    }

    fn try_read(&self) -> bool {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending_writers, owners) = unpack(word);
            if pending_writers > 0 || owners == WRITER {
                return false;
            }
            let new_word = pack(pending_writers, owners + 1);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn try_write(&self) -> bool {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending_writers, owners) = unpack(word);
            if owners != 0 {
                return false;
            }
            let new_word = pack(pending_writers, WRITER);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn register_pending_writer(&self) {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending_writers, owners) = unpack(word);
            let new_word = pack(pending_writers + 1, owners);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    fn unregister_pending_writer(&self) {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending_writers, owners) = unpack(word);
            debug_assert!(pending_writers > 0);
            let new_word = pack(pending_writers - 1, owners);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Registers a pending writer before returning the future, so the moment
    /// a caller asks for the write side every subsequent `read()`/`write()`
    /// poll sees a writer waiting, even if this future itself has not yet
    /// been polled.
    pub fn read(&self) -> ReadLock<'_, T> {
        ReadLock { lock: self }
    }

    pub fn write(&self) -> WriteLock<'_, T> {
        self.register_pending_writer();
        WriteLock {
            lock: self,
            registered: true,
        }
    }

    #[must_use]
    pub fn read_blocking(&self) -> RwMutexReadGuard<'_, T> {
        futures::executor::block_on(self.read())
    }

    #[must_use]
    pub fn write_blocking(&self) -> RwMutexWriteGuard<'_, T> {
        futures::executor::block_on(self.write())
    }

    fn unlock_read(&self) {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending_writers, owners) = unpack(word);
            debug_assert!(owners >= 1);
            let new_word = pack(pending_writers, owners - 1);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
        self.wake_all();
    }

    fn unlock_write(&self) {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending_writers, _owners) = unpack(word);
            let new_word = pack(pending_writers, 0);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
        self.wake_all();
    }

    fn wake_all(&self) {
        let mut waiters = self.waiters.lock();
        for w in waiters.drain(..) {
            w.wake();
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RwMutex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (pending_writers, owners) = unpack(self.state.load(Ordering::Relaxed));
        f.debug_struct("RwMutex")
            .field("pending_writers", &pending_writers)
            .field("owners", &owners)
            .finish()
    }
}

#[must_use = "futures do nothing unless polled or awaited"]
pub struct ReadLock<'a, T> {
    lock: &'a RwMutex<T>,
}

impl<'a, T> Future for ReadLock<'a, T> {
    type Output = RwMutexReadGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        if self.lock.try_read() {
            return task::Poll::Ready(RwMutexReadGuard { lock: self.lock });
        }
        self.lock.waiters.lock().push_back(cx.waker().clone());
        if self.lock.try_read() {
            return task::Poll::Ready(RwMutexReadGuard { lock: self.lock });
        }
        task::Poll::Pending
    }
}

#[must_use = "futures do nothing unless polled or awaited"]
pub struct WriteLock<'a, T> {
    lock: &'a RwMutex<T>,
    registered: bool,
}

impl<'a, T> Future for WriteLock<'a, T> {
    type Output = RwMutexWriteGuard<'a, T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        if self.lock.try_write() {
            self.lock.unregister_pending_writer();
            self.registered = false;
            return task::Poll::Ready(RwMutexWriteGuard { lock: self.lock });
        }
        self.lock.waiters.lock().push_back(cx.waker().clone());
        if self.lock.try_write() {
            self.lock.unregister_pending_writer();
            self.registered = false;
            return task::Poll::Ready(RwMutexWriteGuard { lock: self.lock });
        }
        task::Poll::Pending
    }
}

impl<T> Drop for WriteLock<'_, T> {
    fn drop(&mut self) {
        if self.registered {
            self.lock.unregister_pending_writer();
        }
    }
}

pub struct RwMutexReadGuard<'a, T> {
    lock: &'a RwMutex<T>,
}

impl<'a, T> RwMutexReadGuard<'a, T> {
    /// Consumes the read guard and suspends until it becomes a write guard.
    ///
    /// If this is the only reader, the transition completes as soon as it is
    /// polled. Otherwise it registers as a pending writer - refusing new
    /// readers from that point on, exactly as [`RwMutex::write`] does - and
    /// waits for the remaining readers to finish, mirroring
    /// `RwSpinLockReadGuard::upgrade`'s fast/slow split.
    pub fn upgrade(self) -> Upgrade<'a, T> {
        let lock = self.lock;
        std::mem::forget(self);
        Upgrade {
            lock,
            registered: false,
        }
    }
}

impl<T> Deref for RwMutexReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a read guard exists only while `owners >= 1`.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwMutexReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

/// Future returned by [`RwMutexReadGuard::upgrade`].
#[must_use = "futures do nothing unless polled or awaited"]
pub struct Upgrade<'a, T> {
    lock: &'a RwMutex<T>,
    registered: bool,
}

impl<'a, T> Future for Upgrade<'a, T> {
    type Output = RwMutexWriteGuard<'a, T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        // Our own read share (held since construction, see `upgrade`) counts
        // in `owners`; `owners == 1` means we are the only reader left.
        if self.try_finish() {
            return task::Poll::Ready(RwMutexWriteGuard { lock: self.lock });
        }
        if !self.registered {
            self.lock.register_pending_writer();
            self.registered = true;
        }
        self.lock.waiters.lock().push_back(cx.waker().clone());
        if self.try_finish() {
            return task::Poll::Ready(RwMutexWriteGuard { lock: self.lock });
        }
        task::Poll::Pending
    }
}

impl<T> Upgrade<'_, T> {
    fn try_finish(&mut self) -> bool {
        loop {
            let word = self.lock.state.load(Ordering::Relaxed);
            let (pending_writers, owners) = unpack(word);
            if owners != 1 {
                return false;
            }
            let new_word = pack(pending_writers, WRITER);
            if self
                .lock
                .state
                .compare_exchange(word, new_word, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                if self.registered {
                    self.lock.unregister_pending_writer();
                    self.registered = false;
                }
                return true;
            }
        }
    }
}

impl<T> Drop for Upgrade<'_, T> {
    fn drop(&mut self) {
        if self.registered {
            self.lock.unregister_pending_writer();
        }
    }
}

pub struct RwMutexWriteGuard<'a, T> {
    lock: &'a RwMutex<T>,
}

impl<T> Deref for RwMutexWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a write guard exists only while `owners == WRITER`.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwMutexWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwMutexWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}
