// Licensed under the MIT License.

//! Short-critical-section spinlocks used by [`crate::alloc::Pool`] and the
//! worker queues. These guard a handful of pointer/index updates, never a
//! user callback, so a spin-then-yield-then-sleep backoff beats a kernel
//! mutex in the common uncontended case.

mod backoff;
mod exclusive;
mod rw;

pub use backoff::{Backoff, BackoffPolicy};
pub use exclusive::{SpinLock, SpinLockGuard};
pub use rw::{RwSpinLock, RwSpinLockReadGuard, RwSpinLockWriteGuard};
