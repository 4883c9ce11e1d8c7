// Licensed under the MIT License.

/// Role of a task within a continuation chain, or a standalone/IO task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    First,
    Continuation,
    ErrorHandler,
    Final,
    Standalone,
    Io,
}

/// Lifecycle state of a coroutine task as observed by its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Suspended,
    Running,
    Terminated,
}

/// Where a task should be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTarget {
    /// Load-balance across the queue range, or run on the shared any-queue
    /// when coroutine sharing is enabled.
    Any,
    /// Same queue as the task currently executing (only meaningful when
    /// posting a continuation from inside a running task).
    Same,
    /// A specific queue index.
    Id(usize),
}
