// Licensed under the MIT License.

use std::error::Error as StdError;
use std::pin::Pin;

use futures::future::FutureExt;
use tracing::warn;

use crate::future::{self, Future as TaskFuture};
use crate::task::context::TaskContext;
use crate::task::id::next_task_id;
use crate::task::panic_capture::capture_panic;
use crate::task::task_impl::Task;
use crate::task::types::{QueueTarget, TaskKind};

pub type TaskError = Box<dyn StdError + Send + Sync>;
pub type TaskResult<T> = Result<T, TaskError>;
type BoxFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type FirstFn<T> = Box<dyn FnOnce(TaskContext) -> BoxFut<TaskResult<T>> + Send>;
type ThenFn<T> = Box<dyn FnOnce(TaskContext, T) -> BoxFut<TaskResult<T>> + Send>;
type ErrFn<T> = Box<dyn FnOnce(TaskContext, TaskError) -> BoxFut<TaskResult<T>> + Send>;
type FinalFn<T> = Box<dyn FnOnce(TaskContext, TaskResult<T>) -> BoxFut<()> + Send>;

enum Step<T> {
    Then(ThenFn<T>),
    OnError(ErrFn<T>),
}

/// Builds a `First -> Continuation* -> ErrorHandler* -> Final?` chain.
///
/// On success, the chain walks every queued `Then` step in order. The first
/// error encountered (from `First` or any `Then`) skips forward to the next
/// queued `OnError` step (earlier `Then`/`OnError` steps between the failure
/// point and that handler are not run - walking the chain, not re-running
/// it); an `OnError` step that itself returns `Ok` resumes the success path
/// for subsequent `Then` steps. `Final`, if present, always runs last and
/// observes the chain's terminal `Result` without altering the future's
/// resolved value.
///
/// All links in a chain share one payload type `T`, per this engine's
/// decision (see `DESIGN.md`) to expose a single, typed calling convention
/// rather than the original's dual typed/untyped one.
pub struct ChainBuilder<T> {
    first: FirstFn<T>,
    steps: Vec<Step<T>>,
    finally: Option<FinalFn<T>>,
    high_priority: bool,
    target: QueueTarget,
}

impl<T> ChainBuilder<T>
where
    T: Send + 'static,
{
    #[must_use]
    pub(crate) fn new(first: FirstFn<T>, high_priority: bool, target: QueueTarget) -> Self {
        Self {
            first,
            steps: Vec::new(),
            finally: None,
            high_priority,
            target,
        }
    }

    #[must_use]
    pub fn then<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(TaskContext, T) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
    {
        self.steps
            .push(Step::Then(Box::new(move |ctx, v| Box::pin(f(ctx, v)))));
        self
    }

    #[must_use]
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(TaskContext, TaskError) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
    {
        self.steps
            .push(Step::OnError(Box::new(move |ctx, e| Box::pin(f(ctx, e)))));
        self
    }

    #[must_use]
    pub fn finally<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(TaskContext, TaskResult<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.finally = Some(Box::new(move |ctx, r| Box::pin(f(ctx, r))));
        self
    }

    /// Seals the chain, returning the schedulable [`Task`] and the
    /// [`TaskFuture`] that resolves with the chain's terminal value.
    #[must_use]
    pub fn end(self) -> (Task, TaskFuture<T>)
    where
        T: Clone,
    {
        let id = next_task_id();
        let queue_index = match self.target {
            QueueTarget::Id(i) => Some(i),
            QueueTarget::Any | QueueTarget::Same => None,
        };
        let ctx = TaskContext::new(id, queue_index);

        let (promise, future) = future::channel::<T>();
        let has_finally = self.finally.is_some();
        let first = self.first;
        let steps = self.steps;
        let finally = self.finally;
        let high_priority = self.high_priority;
        let target = self.target;

        let body = Box::pin(async move {
            let mut result = capture_panic(first(ctx.clone())).await;

            for step in steps {
                result = match (step, result) {
                    (Step::Then(f), Ok(v)) => capture_panic(f(ctx.clone(), v)).await,
                    (Step::Then(_), err @ Err(_)) => err,
                    (Step::OnError(f), Err(e)) => capture_panic(f(ctx.clone(), e)).await,
                    (Step::OnError(_), ok @ Ok(_)) => ok,
                };
            }

            if let Some(finally) = finally {
                let guarded = finally(ctx.clone(), clone_result(&result)).map(Ok::<(), TaskError>);
                if let Err(e) = capture_panic(guarded).await {
                    warn!(error = %e, "finally handler panicked");
                }
            }

            match result {
                Ok(v) => promise.set(v),
                Err(e) => promise.set_exception(e),
            }
        });

        let kind = if has_finally {
            TaskKind::Final
        } else {
            TaskKind::First
        };
        let task = Task::new(kind, high_priority, target, body);
        (task, future)
    }
}

fn clone_result<T: Clone>(result: &TaskResult<T>) -> TaskResult<T> {
    match result {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(format!("{e}").into()),
    }
}
