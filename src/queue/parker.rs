// Licensed under the MIT License.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A bounded-wait doorbell: lets a worker thread sleep until either a new
/// item arrives or `timeout` elapses, whichever comes first. Used instead of
/// a plain busy loop so idle coroutine/IO workers do not spin the CPU, and
/// instead of an unbounded wait so a worker can still notice drain/terminate
/// requests that do not themselves ring the bell.
pub(crate) struct Parker {
    woken: Mutex<bool>,
    condvar: Condvar,
}

impl Parker {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            woken: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn notify(&self) {
        let mut woken = self.woken.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *woken = true;
        self.condvar.notify_one();
    }

    pub(crate) fn park(&self, timeout: Duration) {
        let woken = self.woken.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (mut woken, _) = self
            .condvar
            .wait_timeout_while(woken, timeout, |woken| !*woken)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *woken = false;
    }
}
