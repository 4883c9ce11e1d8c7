// Licensed under the MIT License.

//! `coro_rt` multiplexes cooperatively scheduled tasks onto a fixed pool of
//! coroutine-worker threads, alongside a parallel pool of blocking I/O-worker
//! threads. Synchronization primitives suspend the calling task rather than
//! the worker, and a [`sequencer`] layers per-key FIFO ordering and barrier
//! semantics on top of the dispatcher.
//!
//! The typical entry point is [`dispatcher::Dispatcher`].

mod non_blocking_thread;
mod yielding;

pub mod alloc;
pub mod dispatcher;
pub mod error;
pub mod future;
pub mod sequencer;
pub mod spinlock;
pub mod sync;
pub mod task;

pub(crate) mod queue;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{Error, Result};
pub use future::{Future as TaskFuture, Promise};
pub use sequencer::{Sequencer, SequencerConfig};
pub use task::context::TaskContext;
pub use task::id::TaskId;
pub use yielding::YieldFuture;
