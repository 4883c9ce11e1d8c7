// Licensed under the MIT License.

use thiserror::Error;

/// A specialized `Result` type for `coro_rt` operations that return an
/// [`Error`][enum@Error] on failure.
pub type Result<T> = std::result::Result<T, Error>;

/// A synchronous submission-time error from the dispatcher, sequencer, or a
/// synchronization primitive.
///
/// Errors from user task bodies are not represented here; they travel through
/// the task's own [`crate::future::Future`] as a boxed error (see
/// [`crate::future::FutureErrorKind`]).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A queue id outside `[0, numQueues)` (and not one of the `Any`/`Same`
    /// sentinels) was used to post a task.
    #[error("invalid queue id {0}")]
    InvalidQueueId(i64),

    /// A post was attempted while the dispatcher is draining.
    #[error("dispatcher is draining, new posts are rejected")]
    Draining,

    /// A post was attempted after the dispatcher was terminated.
    #[error("dispatcher has been terminated")]
    Terminated,

    /// A negative duration was supplied to a `waitFor`-style call.
    #[error("invalid timeout: {0:?}")]
    InvalidTimeout(std::time::Duration),

    /// A sequencer operation was given an empty key set.
    #[error("sequencer task must carry at least one key, or be marked universal")]
    EmptyKeySet,

    /// We are re-packaging an error from the Rust standard library I/O logic
    /// without adding further detail.
    #[error(transparent)]
    StdIo(#[from] std::io::Error),
}
