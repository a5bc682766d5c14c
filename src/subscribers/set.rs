//! # Fan-out of lifecycle events to subscribers.
//!
//! Each subscriber gets its own bounded queue and worker task, so a slow or
//! crashing subscriber never holds up a controller or another subscriber.
//!
//! ```text
//!   emit_arc(Arc<Event>) ──try_send──► queue "log-writer" ──► worker ──► on_event()
//!                        ──try_send──► queue "metrics"    ──► worker ──► on_event()
//!                             │
//!                             └─ queue full/closed ──► Bus: SubscriberOverflow
//! ```
//!
//! Delivery order holds per subscriber only. A dropped event is not retried.
//! A panic inside `on_event` is caught, logged and published as `SubscriberPanicked`
//! (unless the event was itself a panic report); the worker keeps serving its queue.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};

use super::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Subscriber queues plus the worker tasks draining them.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called inside a tokio runtime when `subs` is non-empty.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, rx) = mpsc::channel::<Arc<Event>>(cap);

            let handle = tokio::spawn(run_worker(sub, rx, bus.clone()));
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Emits an event to all subscribers (clones the event once).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// On a full or closed queue the event is dropped for that subscriber and a
    /// `SubscriberOverflow` is published, unless the event is itself an overflow
    /// report.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);

        for channel in &self.channels {
            let dropped = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                tracing::debug!(subscriber = channel.name, reason = dropped, "subscriber dropped event");
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, dropped));
            }
        }
    }

    /// Closes every queue and waits until the workers drained them.
    pub async fn shutdown(self) {
        drop(self.channels);

        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Delivers queued events to one subscriber until its queue closes.
///
/// A panic while handling a panic report is logged only; republishing it would
/// feed the report back to the same subscriber.
async fn run_worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let delivery = std::panic::AssertUnwindSafe(sub.on_event(ev.as_ref())).catch_unwind();
        if let Err(payload) = delivery.await {
            let info = panic_message(payload.as_ref());
            tracing::warn!(subscriber = sub.name(), %info, "subscriber panicked");
            if !ev.is_subscriber_panic() {
                bus.publish(Event::subscriber_panicked(sub.name(), info));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_every_subscriber_in_order() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![a.clone() as Arc<dyn Subscribe>, b.clone()], Bus::new(16));
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::LoadStarted));
        set.emit(&Event::new(EventKind::EngineCreated));
        set.shutdown().await;

        let expected = vec![EventKind::LoadStarted, EventKind::EngineCreated];
        assert_eq!(*a.0.lock(), expected);
        assert_eq!(*b.0.lock(), expected);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Panicker) as Arc<dyn Subscribe>], bus.clone());

        set.emit(&Event::new(EventKind::LoadStarted));
        set.shutdown().await;

        let ev = rx.recv().await.unwrap();
        assert!(ev.is_subscriber_panic());
        assert_eq!(ev.source.as_deref(), Some("panicker"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_panic_on_panic_report_is_not_republished() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Panicker) as Arc<dyn Subscribe>], bus.clone());

        set.emit(&Event::subscriber_panicked("other", "boom".to_string()));
        set.shutdown().await;

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_set_needs_no_runtime() {
        let set = SubscriberSet::new(Vec::new(), Bus::new(4));
        assert!(set.is_empty());
        set.emit(&Event::new(EventKind::LoadStarted));
    }
}
