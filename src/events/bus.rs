//! # Lifecycle event bus.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] sender. Controllers, stores and
//! subscriber workers publish into it; the hub listener and tests read from it.
//!
//! ```text
//!   Controller A ──┐
//!   Controller B ──┼──► Bus ──► hub listener ──► SubscriberSet
//!   EngineStore  ──┤
//!   Sub workers  ──┘
//! ```
//!
//! - `publish()` is synchronous and works outside a tokio runtime, so a
//!   controller in its degraded state can still report what happened.
//! - One ring buffer of `capacity` events serves every receiver; a receiver that
//!   falls behind gets `RecvError::Lagged(n)` and loses the `n` oldest events.
//! - Events sent while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the event channel; every clone publishes into the same buffer.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus buffering up to `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped (this function still returns immediately).
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Returns a fresh receiver; it sees only events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(crate::core::DEFAULT_BUS_CAPACITY)
    }
}
