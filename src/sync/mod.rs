// Licensed under the MIT License.

//! Yield-aware synchronization primitives. Unlike `std::sync` primitives,
//! these suspend the *calling task* when possible instead of blocking its
//! worker thread outright: a coroutine task yields back to its worker and is
//! resumed once the primitive becomes available, while a plain OS thread
//! (one with no current task, e.g. an application thread calling into the
//! runtime) falls back to a classic thread-parking wait.

mod condvar;
mod mutex;
mod rwmutex;

pub use condvar::CondVar;
pub use mutex::{Mutex, ReverseGuard};
pub use rwmutex::{RwMutex, RwMutexReadGuard, RwMutexWriteGuard};
