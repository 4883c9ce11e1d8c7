// Licensed under the MIT License.

//! Per-worker queue fabric.
//!
//! A [`TaskQueue`] owns one coroutine-worker thread. Posted tasks land on a
//! wait queue; each worker cycle splices the wait queue onto the tail of its
//! run queue and then polls run-queue entries in turn, exactly as the
//! splice-then-cycle description in this engine's design calls for. A task
//! that returns `Pending` leaves the run queue and re-enters it only when its
//! waker fires - there is no periodic re-poll of a suspended task.
//!
//! [`IoQueue`] is the blocking counterpart: it owns a fixed thread pool and
//! runs each `IoTask` to completion, with no suspension concept at all.

mod any_queue;
mod io_queue;
mod parker;
mod task_queue;

pub(crate) use any_queue::AnyQueue;
pub(crate) use io_queue::IoQueue;
pub(crate) use task_queue::TaskQueue;
