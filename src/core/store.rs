//! # EngineStore: observer-counted projection of a controller.
//!
//! The first observer activates the controller (starts the load unless it is
//! already running); the last observer leaving destroys it.
//!
//! ```text
//! subscribe(cb) ─► observers += 1 ─► cb(current engine)
//!                      │ first?  └─► StoreActivated, controller.load()
//!                      └─► forwarder: watch.changed() ─► cb(engine) when the handle changes
//!
//! Subscription::unsubscribe() / drop ─► cancel forwarder ─► observers -= 1
//!                                                             └─ last? ─► StoreDeactivated, controller.destroy()
//! ```
//!
//! Without a tokio runtime the callback only receives the initial value.
//!
//! Deactivation is terminal: the controller stays `Destroyed`, so a store that
//! is subscribed to again delivers `None` and never reloads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::controller::EngineController;
use crate::core::state::EngineState;
use crate::engine::{EngineRef, same_engine};
use crate::events::{Event, EventKind};

struct StoreShared {
    controller: Arc<EngineController>,
    observers: Mutex<usize>,
}

impl StoreShared {
    fn publish(&self, kind: EventKind) {
        self.controller
            .publish(Event::new(kind).with_controller(self.controller.id()));
    }
}

/// Reactive view of one [`EngineController`].
#[derive(Clone)]
pub struct EngineStore {
    shared: Arc<StoreShared>,
}

impl EngineStore {
    pub(crate) fn new(controller: Arc<EngineController>) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                controller,
                observers: Mutex::new(0),
            }),
        }
    }

    /// Attaches `callback`, which is called with the current engine right away and
    /// again every time the published engine changes.
    ///
    /// After the last subscription detached, the controller is destroyed for good;
    /// a new subscriber only ever sees `None`.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<EngineRef>) + Send + Sync + 'static,
    {
        let controller = &self.shared.controller;
        let first = {
            let mut observers = self.shared.observers.lock();
            *observers += 1;
            *observers == 1
        };

        let mut rx = controller.watch();
        let current = rx.borrow_and_update().engine();
        callback(current.clone());

        let token = CancellationToken::new();
        if let Ok(runtime) = Handle::try_current() {
            runtime.spawn(forward(rx, current, callback, token.clone()));
        }

        if first {
            self.shared.publish(EventKind::StoreActivated);
            controller.load();
        }

        Subscription {
            shared: Arc::clone(&self.shared),
            token,
            active: AtomicBool::new(true),
        }
    }

    /// Current number of attached observers.
    pub fn observers(&self) -> usize {
        *self.shared.observers.lock()
    }

    /// Non-activating view of the controller state (loading flag, error, engine).
    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.shared.controller.watch()
    }

    pub fn controller(&self) -> &Arc<EngineController> {
        &self.shared.controller
    }
}

async fn forward<F>(
    mut rx: watch::Receiver<EngineState>,
    mut last: Option<EngineRef>,
    callback: F,
    token: CancellationToken,
) where
    F: Fn(Option<EngineRef>) + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = rx.borrow_and_update().engine();
                let unchanged = match (&last, &next) {
                    (Some(a), Some(b)) => same_engine(a, b),
                    (None, None) => true,
                    _ => false,
                };
                if !unchanged {
                    callback(next.clone());
                    last = next;
                }
            }
        }
    }
}

/// Observer registration returned by [`EngineStore::subscribe`].
///
/// Detaches on [`unsubscribe`](Self::unsubscribe) or drop, whichever comes first.
pub struct Subscription {
    shared: Arc<StoreShared>,
    token: CancellationToken,
    active: AtomicBool,
}

impl Subscription {
    /// Detaches the observer. Idempotent.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();

        let last = {
            let mut observers = self.shared.observers.lock();
            *observers = observers.saturating_sub(1);
            *observers == 0
        };
        if last {
            self.shared.publish(EventKind::StoreDeactivated);
            self.shared.controller.destroy();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::registry::SingletonRegistry;
    use crate::engine::Backends;
    use crate::events::Bus;
    use crate::testing::MockFactory;
    use std::time::Duration;

    fn store(factory: &Arc<MockFactory>, defer: bool) -> EngineStore {
        let cfg = EngineConfig {
            resource_url: "url1".into(),
            defer,
            ..EngineConfig::default()
        };
        let backends = Backends::new().with(cfg.mode, factory.clone());
        let controller =
            EngineController::new(cfg, Arc::new(SingletonRegistry::new()), backends, Bus::new(64));
        EngineStore::new(controller)
    }

    fn recorder() -> (Arc<Mutex<Vec<Option<usize>>>>, impl Fn(Option<EngineRef>) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |engine: Option<EngineRef>| {
            sink.lock().push(engine.map(|e| Arc::as_ptr(&e) as *const () as usize));
        })
    }

    async fn settle_forwarders() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_deferred_store_loads_on_first_subscribe() {
        let factory = MockFactory::arc();
        let store = store(&factory, true);
        assert_eq!(factory.calls(), 0);

        let (seen, cb) = recorder();
        let sub = store.subscribe(cb);
        store.controller().load().settled().await.unwrap();
        settle_forwarders().await;

        assert_eq!(factory.calls(), 1);
        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_none());
        assert!(seen[1].is_some());
        drop(sub);
    }

    #[tokio::test]
    async fn test_last_unsubscribe_destroys_controller() {
        let factory = MockFactory::arc();
        let store = store(&factory, true);

        let a = store.subscribe(|_| {});
        let b = store.subscribe(|_| {});
        assert_eq!(store.observers(), 2);
        store.controller().load().settled().await.unwrap();

        a.unsubscribe();
        a.unsubscribe();
        assert_eq!(store.observers(), 1);
        assert!(store.controller().state().is_ready());

        drop(b);
        assert_eq!(store.observers(), 0);
        assert!(store.controller().state().is_destroyed());
        assert_eq!(factory.engine(0).destroy_calls(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_engine_is_not_redelivered() {
        let factory = MockFactory::gated();
        let store = store(&factory, true);

        let (seen, cb) = recorder();
        let _sub = store.subscribe(cb);
        settle_forwarders().await;

        factory.open_gate(0);
        store.controller().load().settled().await.unwrap();
        settle_forwarders().await;

        // Idle -> Loading -> Ready: only the engine change is delivered.
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_resubscribe_after_deactivation_stays_destroyed() {
        let factory = MockFactory::arc();
        let store = store(&factory, true);

        let first = store.subscribe(|_| {});
        store.controller().load().settled().await.unwrap();
        first.unsubscribe();
        assert!(store.controller().state().is_destroyed());

        let (seen, cb) = recorder();
        let again = store.subscribe(cb);
        store.controller().load().settled().await.unwrap();
        settle_forwarders().await;

        assert_eq!(*seen.lock(), vec![None]);
        assert_eq!(factory.calls(), 1);
        assert!(store.controller().state().is_destroyed());
        drop(again);
    }

    #[tokio::test]
    async fn test_watch_state_does_not_activate() {
        let factory = MockFactory::arc();
        let store = store(&factory, true);

        let rx = store.watch_state();
        assert!(matches!(*rx.borrow(), EngineState::Idle));
        assert_eq!(factory.calls(), 0);
        assert_eq!(store.observers(), 0);
    }
}
