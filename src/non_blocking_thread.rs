// Licensed under the MIT License.

//! Some `coro_rt` APIs block the calling OS thread (e.g. [`crate::future::Future::get`]
//! called from outside a task). These are intended for callers on ordinary
//! application threads. Calling them from a coroutine worker thread would
//! stall that worker and every task queued behind it, so we flag worker
//! threads and panic if a blocking entry point is reached from one.

use std::cell::Cell;

pub fn flag_current_thread() {
    IS_FLAGGED.with(|x| x.set(true));
}

pub fn assert_not_flagged() {
    IS_FLAGGED.with(|x| {
        assert!(
            !x.get(),
            "blocking coro_rt APIs must not be called from a worker thread owned by coro_rt"
        );
    });
}

thread_local! {
    static IS_FLAGGED: Cell<bool> = const { Cell::new(false) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn flagged_thread_panics() {
        flag_current_thread();
        assert_not_flagged();
    }

    #[test]
    fn unflagged_thread_ok() {
        assert_not_flagged();
    }
}
