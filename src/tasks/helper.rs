//! # Task constructors.
//!
//! [`TaskHelper`] normalizes synchronous and asynchronous results into a
//! [`Task`]: an engine wrapper can answer from a cache with
//! [`TaskHelper::resolve`], refuse with [`TaskHelper::reject`], or hand the real
//! work to the runtime with [`TaskHelper::spawn`]; callers observe all three the
//! same way.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::error::ErrorReason;
use crate::tasks::task::Task;

/// Task over the engine error channel.
pub type EngineTask<R> = Task<R, ErrorReason>;

/// Factory functions for tasks.
pub struct TaskHelper;

impl TaskHelper {
    /// Creates a pending task.
    pub fn create<R, E>() -> Task<R, E> {
        Task::new()
    }

    /// Creates a task that has been resolved with `value`.
    pub fn resolve<R, E>(value: R) -> Task<R, E> {
        Task::from_value(value)
    }

    /// Creates a task that has been rejected with `reason`.
    pub fn reject<R, E>(reason: E) -> Task<R, E> {
        Task::from_error(reason)
    }

    /// Creates a task that has been aborted with `reason`.
    ///
    /// Same terminal state as [`TaskHelper::reject`].
    pub fn abort<R, E>(reason: E) -> Task<R, E> {
        let task = Task::new();
        let _ = task.abort(reason);
        task
    }

    /// Drives `fut` on the current tokio runtime and settles the returned task
    /// with its output.
    ///
    /// A panic inside `fut` rejects the task with [`ErrorCode::Unknown`](crate::ErrorCode::Unknown).
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn spawn<R, F>(fut: F) -> EngineTask<R>
    where
        R: Send + Sync + 'static,
        F: Future<Output = Result<R, ErrorReason>> + Send + 'static,
    {
        let task = Task::new();
        let producer = task.clone();
        tokio::spawn(async move {
            let _ = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(value)) => producer.resolve(value),
                Ok(Err(reason)) => producer.reject(reason),
                Err(payload) => producer.reject(ErrorReason::from_panic(payload.as_ref())),
            };
        });
        task
    }
}
