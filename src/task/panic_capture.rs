// Licensed under the MIT License.

//! Turns a panicking task body into an ordinary [`TaskError`] instead of
//! letting the unwind propagate into the worker's poll loop and take the
//! whole thread down with it.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::FutureExt;

use crate::task::chain::TaskError;

/// Drives `fut` to completion, catching a panic from any of its polls and
/// reporting it as a [`TaskError`] rather than unwinding.
pub(crate) async fn capture_panic<Fut, T>(fut: Fut) -> Result<T, TaskError>
where
    Fut: Future<Output = Result<T, TaskError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(panic_message(&payload).into()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_panicking_future_passes_through() {
        futures::executor::block_on(async {
            let result = capture_panic(async { Ok::<_, TaskError>(7) }).await;
            assert_eq!(result.unwrap(), 7);
        });
    }

    #[test]
    fn panic_is_captured_as_an_error() {
        futures::executor::block_on(async {
            let result: Result<i32, TaskError> =
                capture_panic(async { panic!("boom") }).await;
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), "boom");
        });
    }
}
