//! # Lifecycle events emitted by controllers, stores and subscriber workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Load events**: how a controller obtained (or failed to obtain) an engine
//! - **Teardown events**: how a controller let go of an engine
//! - **Delivery events**: subscriber overflow/panic, store activation
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! controller id, sharing key, reasons and reference counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use enginevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::EngineAdopted)
//!     .with_controller(7)
//!     .with_key("viewer")
//!     .with_refs(2);
//!
//! assert_eq!(ev.kind, EventKind::EngineAdopted);
//! assert_eq!(ev.key.as_deref(), Some("viewer"));
//! assert_eq!(ev.refs, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::engine::ExecutionMode;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Load events ===
    /// A load began (state → `Loading`).
    ///
    /// Sets:
    /// - `controller`, `mode`, `key` (when shared)
    LoadStarted,

    /// The environment cannot host the backend; the controller stays idle.
    ///
    /// Sets:
    /// - `controller`, `mode`
    EnvironmentUnavailable,

    /// A live shared engine was adopted from the registry.
    ///
    /// Sets:
    /// - `controller`, `key`, `refs` (count after retain)
    EngineAdopted,

    /// Another controller is already constructing the shared engine; this one waits for it.
    ///
    /// Sets:
    /// - `controller`, `key`
    ConstructionJoined,

    /// A construction strategy produced an engine and it was published.
    ///
    /// Sets:
    /// - `controller`, `source` (factory name), `key` (when shared)
    EngineCreated,

    /// Construction failed; the error is published (state → `Failed`).
    ///
    /// Sets:
    /// - `controller`, `reason`, `key` (when shared)
    LoadFailed,

    /// A construction finished after its controller was destroyed or reloaded; the
    /// engine was let go instead of published.
    ///
    /// Sets:
    /// - `controller`, `key` (when shared)
    EngineDiscarded,

    // === Teardown events ===
    /// A registry reference was released.
    ///
    /// Sets:
    /// - `controller`, `key`, `refs` (remaining; `0` means the engine was torn down)
    EngineReleased,

    /// A private engine was torn down directly.
    ///
    /// Sets:
    /// - `controller`
    EngineDestroyed,

    /// `reload()` was requested.
    ///
    /// Sets:
    /// - `controller`, `mode` (after merge), `key` (after merge)
    ReloadRequested,

    /// Controller entered its terminal state.
    ///
    /// Sets:
    /// - `controller`
    ControllerDestroyed,

    /// Controller state changed.
    ///
    /// Sets:
    /// - `controller`, `state` (label of the new state)
    StateChanged,

    // === Store events ===
    /// First observer attached to a store.
    ///
    /// Sets:
    /// - `controller`
    StoreActivated,

    /// Last observer detached from a store.
    ///
    /// Sets:
    /// - `controller`
    StoreDeactivated,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Id of the emitting controller.
    pub controller: Option<u64>,
    /// Registry sharing key, if the controller is shared.
    pub key: Option<Arc<str>>,
    /// Execution mode of the controller.
    pub mode: Option<ExecutionMode>,
    /// State label (for `StateChanged`).
    pub state: Option<&'static str>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Registry reference count after the operation.
    pub refs: Option<usize>,
    /// Name of the emitting subscriber or factory.
    pub source: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            controller: None,
            key: None,
            mode: None,
            state: None,
            reason: None,
            refs: None,
            source: None,
        }
    }

    /// Attaches the emitting controller id.
    #[inline]
    pub fn with_controller(mut self, id: u64) -> Self {
        self.controller = Some(id);
        self
    }

    /// Attaches a sharing key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a sharing key when there is one.
    #[inline]
    pub fn with_key_opt(self, key: Option<&str>) -> Self {
        match key {
            Some(key) => self.with_key(key),
            None => self,
        }
    }

    /// Attaches an execution mode.
    #[inline]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Attaches a state label.
    #[inline]
    pub fn with_state(mut self, state: &'static str) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a reference count.
    #[inline]
    pub fn with_refs(mut self, refs: usize) -> Self {
        self.refs = Some(refs);
        self
    }

    /// Attaches the emitting subscriber or factory name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::LoadStarted);
        let b = Event::new(EventKind::LoadStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_optional_key_is_skipped_when_absent() {
        let shared = Event::new(EventKind::LoadStarted).with_key_opt(Some("k"));
        let private = Event::new(EventKind::LoadStarted).with_key_opt(None);

        assert_eq!(shared.key.as_deref(), Some("k"));
        assert!(private.key.is_none());
    }

    #[test]
    fn test_subscriber_overflow_event() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.source.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
