//! # Settle-once asynchronous result container.
//!
//! A [`Task<R, E>`] starts **pending** and settles exactly once, either
//! **resolved** with a value `R` or **rejected** with a reason `E`. Once settled
//! the outcome never changes and every observer sees the same outcome:
//!
//! ```text
//!            resolve(v)
//! Pending ───────────────► Resolved(v)
//!    │
//!    │       reject(e)
//!    └───────────────────► Rejected(e)
//! ```
//!
//! ## Observation
//! - [`Task::on_settled`] / [`Task::wait`] attach continuations. A continuation
//!   attached to a pending task fires on settlement; one attached to a settled
//!   task fires immediately (replay). Each fires exactly once.
//! - [`Task::settled`] awaits the outcome (clones it out).
//!
//! ## Rules
//! - Settling twice is reported as [`SettleError::AlreadySettled`]; the first
//!   outcome stands.
//! - Continuations run on the thread that settles (or attaches), outside any lock.
//! - No retries, no timeout. Wrap `settled()` in `tokio::time::timeout` if needed.
//! - Clones share the same state; a task has no identity beyond that.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::SettleError;

type Continuation<R, E> = Box<dyn FnOnce(&Result<R, E>) + Send + 'static>;

/// Label of a task's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Resolved,
    Rejected,
}

impl TaskStatus {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Resolved => "resolved",
            TaskStatus::Rejected => "rejected",
        }
    }
}

struct Shared<R, E> {
    outcome: OnceLock<Result<R, E>>,
    continuations: Mutex<Vec<Continuation<R, E>>>,
    notify: Notify,
}

/// Settle-once result of an asynchronous operation.
///
/// # Example
/// ```
/// use enginevisor::Task;
///
/// let task: Task<u32, String> = Task::new();
/// let seen = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
///
/// let s = seen.clone();
/// task.wait(
///     move |v| s.store(*v, std::sync::atomic::Ordering::SeqCst),
///     |_e| unreachable!(),
/// );
///
/// task.resolve(7).unwrap();
/// assert!(task.reject("late".into()).is_err());
/// assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 7);
/// ```
pub struct Task<R, E> {
    shared: Arc<Shared<R, E>>,
}

impl<R, E> Clone for Task<R, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R, E> Default for Task<R, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, E> Task<R, E> {
    /// Creates a pending task.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: OnceLock::new(),
                continuations: Mutex::new(Vec::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Creates a task already resolved with `value`.
    pub fn from_value(value: R) -> Self {
        let task = Self::new();
        let _ = task.settle(Ok(value));
        task
    }

    /// Creates a task already rejected with `reason`.
    pub fn from_error(reason: E) -> Self {
        let task = Self::new();
        let _ = task.settle(Err(reason));
        task
    }

    /// Resolves a pending task.
    pub fn resolve(&self, value: R) -> Result<(), SettleError> {
        self.settle(Ok(value))
    }

    /// Rejects a pending task.
    pub fn reject(&self, reason: E) -> Result<(), SettleError> {
        self.settle(Err(reason))
    }

    /// Aborts a pending task.
    ///
    /// There is no separate "aborted" state: the task is rejected with `reason`,
    /// which should say so (e.g. [`ErrorReason::cancelled`](crate::ErrorReason::cancelled)).
    pub fn abort(&self, reason: E) -> Result<(), SettleError> {
        tracing::trace!("task.abort");
        self.settle(Err(reason))
    }

    /// Returns the current state label.
    pub fn status(&self) -> TaskStatus {
        match self.shared.outcome.get() {
            None => TaskStatus::Pending,
            Some(Ok(_)) => TaskStatus::Resolved,
            Some(Err(_)) => TaskStatus::Rejected,
        }
    }

    /// True while the task has not settled.
    pub fn is_pending(&self) -> bool {
        self.shared.outcome.get().is_none()
    }

    /// Returns the outcome if the task has settled.
    pub fn outcome(&self) -> Option<&Result<R, E>> {
        self.shared.outcome.get()
    }

    /// True if both handles observe the same task.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Attaches a continuation that fires exactly once with the outcome.
    ///
    /// Fires immediately (on the calling thread) if the task is already settled.
    pub fn on_settled<F>(&self, f: F)
    where
        F: FnOnce(&Result<R, E>) + Send + 'static,
    {
        // The outcome is checked under the continuation lock; `settle` publishes
        // the outcome before draining under the same lock, so a continuation is
        // either queued and drained, or sees the outcome here. Never both.
        let mut queued = self.shared.continuations.lock();
        match self.shared.outcome.get() {
            Some(outcome) => {
                drop(queued);
                f(outcome);
            }
            None => queued.push(Box::new(f)),
        }
    }

    /// Attaches a pair of callbacks, one per outcome.
    pub fn wait<S, F>(&self, on_resolved: S, on_rejected: F)
    where
        S: FnOnce(&R) + Send + 'static,
        F: FnOnce(&E) + Send + 'static,
    {
        self.on_settled(move |outcome| match outcome {
            Ok(value) => on_resolved(value),
            Err(reason) => on_rejected(reason),
        });
    }

    fn settle(&self, outcome: Result<R, E>) -> Result<(), SettleError> {
        if self.shared.outcome.set(outcome).is_err() {
            return Err(SettleError::AlreadySettled {
                state: self.status().as_label(),
            });
        }

        let drained = std::mem::take(&mut *self.shared.continuations.lock());
        if let Some(outcome) = self.shared.outcome.get() {
            for f in drained {
                f(outcome);
            }
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

impl<R: Clone, E: Clone> Task<R, E> {
    /// Waits until the task settles and returns a copy of its outcome.
    ///
    /// Returns immediately for an already settled task.
    pub async fn settled(&self) -> Result<R, E> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.shared.outcome.get() {
                return outcome.clone();
            }
            notified.await;
        }
    }
}

impl<R, E> fmt::Debug for Task<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("status", &self.status())
            .finish()
    }
}
