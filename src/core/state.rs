use std::fmt;

use crate::engine::EngineRef;
use crate::error::ErrorReason;

/// Lifecycle state of an [`EngineController`](crate::EngineController).
///
/// ```text
///   Idle ──load()──► Loading ──► Ready(engine)
///    ▲                  │   └──► Failed(reason)
///    └──── reload() ────┘
///   any ──destroy()──► Destroyed (terminal)
/// ```
#[derive(Clone, Default)]
pub enum EngineState {
    /// No engine and no load in flight (initial, degraded, or between reloads).
    #[default]
    Idle,
    /// A construction is in flight.
    Loading,
    /// An engine is published.
    Ready(EngineRef),
    /// The last construction failed.
    Failed(ErrorReason),
    /// Terminal; `load`/`reload` have no effect.
    Destroyed,
}

impl EngineState {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Loading => "loading",
            EngineState::Ready(_) => "ready",
            EngineState::Failed(_) => "failed",
            EngineState::Destroyed => "destroyed",
        }
    }

    /// Published engine, if any.
    pub fn engine(&self) -> Option<EngineRef> {
        match self {
            EngineState::Ready(engine) => Some(engine.clone()),
            _ => None,
        }
    }

    /// Last construction error, if any.
    pub fn error(&self) -> Option<&ErrorReason> {
        match self {
            EngineState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        matches!(self, EngineState::Loading)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready(_))
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        matches!(self, EngineState::Destroyed)
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
            other => f.write_str(other.as_label()),
        }
    }
}
