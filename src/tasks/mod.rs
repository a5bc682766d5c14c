//! # Task abstraction.
//!
//! Every fallible engine operation is represented by a [`Task`]:
//! - [`Task`] - settle-once result container with replay for late observers
//! - [`TaskStatus`] - pending / resolved / rejected label
//! - [`TaskHelper`] - constructors for pending, resolved, rejected and spawned tasks
//! - [`EngineTask`] - `Task<R, ErrorReason>`, the engine error channel

mod helper;
mod task;

pub use helper::{EngineTask, TaskHelper};
pub use task::{Task, TaskStatus};
