// Licensed under the MIT License.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicI64, Ordering};

use super::backoff::{Backoff, BackoffPolicy};

// The word packs (pending_upgrades: i32 high, owners: i32 low) into one i64
// so every transition is a single compare-exchange. `owners` follows the
// same convention as the core contract: positive = reader count, 0 = free,
// -1 = writer held.
const OWNERS_MASK: i64 = 0xFFFF_FFFF;

fn pack(pending_upgrades: i32, owners: i32) -> i64 {
    (i64::from(pending_upgrades) << 32) | (i64::from(owners as u32))
}

fn unpack(word: i64) -> (i32, i32) {
    let pending = (word >> 32) as i32;
    let owners = (word & OWNERS_MASK) as i32;
    (pending, owners)
}

/// A reader/writer spinlock whose state is `(pending_upgrades, owners)` with
/// `owners >= 0` meaning that many readers hold it and `owners == -1` meaning
/// a writer holds it. Upgrading a lone reader is a single fast transition;
/// upgrading with other readers present goes through a "pending upgrade"
/// state that blocks new readers without evicting existing ones.
pub struct RwSpinLock<T> {
    state: AtomicI64,
    value: UnsafeCell<T>,
}

// SAFETY: all access to `value` happens through a guard obtained while the
// packed state guarantees exclusive or shared ownership as appropriate.
unsafe impl<T: Send> Send for RwSpinLock<T> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for RwSpinLock<T> {}

impl<T> RwSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicI64::new(0),
            value: UnsafeCell::new(value),
        }
    }

    pub fn read(&self) -> RwSpinLockReadGuard<'_, T> {
        let mut backoff = Backoff::new(BackoffPolicy::Exponential, 4, 512);
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending, owners) = unpack(word);
            if pending == 0 && owners >= 0 {
                let new_word = pack(pending, owners + 1);
                if self
                    .state
                    .compare_exchange(word, new_word, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return RwSpinLockReadGuard { lock: self };
                }
            }
            backoff.step();
        }
    }

    pub fn write(&self) -> RwSpinLockWriteGuard<'_, T> {
        let mut backoff = Backoff::new(BackoffPolicy::Exponential, 4, 512);
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending, owners) = unpack(word);
            if owners == 0 {
                let new_word = pack(pending, -1);
                if self
                    .state
                    .compare_exchange(word, new_word, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return RwSpinLockWriteGuard { lock: self };
                }
            }
            backoff.step();
        }
    }

    fn unlock_read(&self) {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending, owners) = unpack(word);
            debug_assert!(owners >= 1);
            let new_word = pack(pending, owners - 1);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    fn unlock_write(&self) {
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending, _owners) = unpack(word);
            let new_word = pack(pending, 0);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Upgrades a read guard to a write guard. If this is the only reader,
    /// the transition is a single fast compare-exchange (`pending,1 ->
    /// pending,-1`); otherwise it registers a pending upgrade (blocking new
    /// readers) and spins until the remaining readers have left.
    fn upgrade(&self) {
        let mut backoff = Backoff::new(BackoffPolicy::Exponential, 4, 512);
        // Fast path: we are the only reader.
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending, owners) = unpack(word);
            if owners == 1 {
                let new_word = pack(pending, -1);
                if self
                    .state
                    .compare_exchange(word, new_word, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
                backoff.step();
                continue;
            }
            break;
        }

        // Slow path: register as a pending upgrade, release our read share,
        // then spin until we are the sole owner and can become the writer.
        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending, owners) = unpack(word);
            debug_assert!(owners >= 1);
            let new_word = pack(pending + 1, owners - 1);
            if self
                .state
                .compare_exchange(word, new_word, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
            backoff.step();
        }

        loop {
            let word = self.state.load(Ordering::Relaxed);
            let (pending, owners) = unpack(word);
            if owners == 0 {
                let new_word = pack(pending - 1, -1);
                if self
                    .state
                    .compare_exchange(word, new_word, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
            }
            backoff.step();
        }
    }

    #[must_use]
    pub fn num_readers(&self) -> i32 {
        unpack(self.state.load(Ordering::Relaxed)).1.max(0)
    }

    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        unpack(self.state.load(Ordering::Relaxed)).1 == -1
    }

    #[must_use]
    pub fn num_pending_upgrades(&self) -> i32 {
        unpack(self.state.load(Ordering::Relaxed)).0
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RwSpinLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (pending, owners) = unpack(self.state.load(Ordering::Relaxed));
        f.debug_struct("RwSpinLock")
            .field("pending_upgrades", &pending)
            .field("owners", &owners)
            .finish()
    }
}

pub struct RwSpinLockReadGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<T> RwSpinLockReadGuard<'_, T> {
    /// Consumes the read guard and blocks until it becomes a write guard.
    #[must_use]
    pub fn upgrade(self) -> RwSpinLockWriteGuard<'_, T> {
        let lock = self.lock;
        std::mem::forget(self);
        lock.upgrade();
        RwSpinLockWriteGuard { lock }
    }
}

impl<T> Deref for RwSpinLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding a read guard guarantees owners >= 1 and no writer.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for RwSpinLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

pub struct RwSpinLockWriteGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<T> Deref for RwSpinLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding a write guard guarantees exclusive ownership.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for RwSpinLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for RwSpinLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn multiple_readers_allowed() {
        let lock = RwSpinLock::new(1);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 1);
        assert_eq!(*r2, 1);
        assert_eq!(lock.num_readers(), 2);
    }

    #[test]
    fn writer_excludes_readers() {
        let lock = RwSpinLock::new(1);
        let mut w = lock.write();
        *w = 2;
        assert!(lock.is_write_locked());
        drop(w);
        assert_eq!(*lock.read(), 2);
    }

    #[test]
    fn fast_upgrade_with_single_reader() {
        let lock = RwSpinLock::new(1);
        let r = lock.read();
        let mut w = r.upgrade();
        *w = 7;
        drop(w);
        assert_eq!(*lock.read(), 7);
    }

    #[test]
    fn upgrade_under_contention_converges() {
        let lock = Arc::new(RwSpinLock::new(0_u64));
        let _r1 = lock.read();
        let _r2 = lock.read();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    let r = lock.read();
                    let mut w = r.upgrade();
                    *w += 1;
                })
            })
            .collect();

        drop(_r1);
        drop(_r2);

        for h in handles {
            h.join().unwrap();
        }

        assert!(!lock.is_write_locked());
        assert_eq!(lock.num_readers(), 0);
        assert_eq!(lock.num_pending_upgrades(), 0);
        assert_eq!(*lock.read(), 10);
    }
}
