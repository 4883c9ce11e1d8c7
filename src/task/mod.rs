// Licensed under the MIT License.

//! Task control blocks and the continuation-chain builder.
//!
//! A "coroutine task" here is a boxed, pinned `Future<Output = ()>`: the
//! compiler-generated `async`/`await` state machine stands in for the
//! stackful coroutine's own stack (see [`crate::alloc`]'s module doc), and
//! polling it once is one "resume" of that coroutine.

pub mod chain;
pub mod cls;
pub mod context;
pub mod id;
pub mod io_task;
pub mod types;

pub(crate) mod current;
pub(crate) mod panic_capture;
pub(crate) mod task_impl;

pub(crate) use current::{current_queue_index, CurrentQueueGuard};
pub(crate) use panic_capture::capture_panic;

pub use chain::ChainBuilder;
pub use cls::Cls;
pub use context::TaskContext;
pub use id::TaskId;
pub use io_task::IoTask;
pub use task_impl::Task;
pub use types::{QueueTarget, TaskKind, TaskState};
