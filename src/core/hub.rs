//! # EngineHub: creates controllers and delivers their events.
//!
//! The [`EngineHub`] owns the event bus, the construction strategies and a
//! handle to the [`SingletonRegistry`]. Every controller it creates shares them.
//!
//! ## Architecture
//! ```text
//! EngineHub::builder(HubConfig)
//!     .with_subscribers(..)   ─► SubscriberSet (one worker per subscriber)
//!     .with_backends(..)      ─► Backends (factory per ExecutionMode)
//!     .with_registry(..)      ─► SingletonRegistry (default: process-wide)
//!     .build()
//!
//! hub.controller(patch) ─► EngineController (non-deferred: load() right away)
//! hub.store(patch)      ─► EngineStore over a new controller
//!
//! Event flow:
//!   EngineController ── publish(Event) ──► Bus ──► hub listener ──► SubscriberSet::emit_arc
//! ```
//!
//! Dropping the hub stops the listener and shuts the subscriber workers down;
//! controllers created by it keep working.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use enginevisor::{
//!     Backends, EngineConfigPatch, EngineHandle, EngineHub, EngineRef, EngineTask,
//!     ExecutionMode, FnFactory, HubConfig, LoggerRef, SingletonRegistry, TaskHelper,
//! };
//!
//! struct Null;
//! impl EngineHandle for Null {
//!     fn destroy(&self) -> EngineTask<bool> { TaskHelper::resolve(true) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let backends = Backends::new().with(
//!         ExecutionMode::WorkerIsolated,
//!         FnFactory::arc("null", |_: &str, _: LoggerRef| {
//!             TaskHelper::resolve(Arc::new(Null) as EngineRef)
//!         }),
//!     );
//!     let hub = EngineHub::builder(HubConfig::default())
//!         .with_backends(backends)
//!         .with_registry(Arc::new(SingletonRegistry::new()))
//!         .build();
//!
//!     let viewer = hub.controller(EngineConfigPatch::new().singleton_key("viewer"));
//!     viewer.load().settled().await.unwrap();
//!     assert!(viewer.engine().is_some());
//!
//!     viewer.destroy();
//!     assert!(hub.registry().is_empty());
//! }
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::core::config::{EngineConfig, EngineConfigPatch, HubConfig};
use crate::core::controller::EngineController;
use crate::core::registry::SingletonRegistry;
use crate::core::store::EngineStore;
use crate::engine::Backends;
use crate::events::{Bus, Event};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for an [`EngineHub`].
pub struct EngineHubBuilder {
    cfg: HubConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    registry: Option<Arc<SingletonRegistry>>,
    backends: Backends,
}

impl EngineHubBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: HubConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            registry: None,
            backends: Backends::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues. They need a tokio runtime at `build()` time.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<SingletonRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the construction strategies.
    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Builds the hub and starts the subscriber listener.
    pub fn build(self) -> Arc<EngineHub> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();
        let registry = self.registry.unwrap_or_else(SingletonRegistry::global);

        if !self.subscribers.is_empty() {
            match Handle::try_current() {
                Ok(runtime) => {
                    let set = SubscriberSet::new(self.subscribers, bus.clone());
                    runtime.spawn(subscriber_listener(bus.subscribe(), set, token.clone()));
                }
                Err(_) => {
                    tracing::warn!(
                        subscribers = self.subscribers.len(),
                        "no tokio runtime; event subscribers are disabled"
                    );
                }
            }
        }

        Arc::new(EngineHub {
            cfg: self.cfg,
            bus,
            registry,
            backends: self.backends,
            token,
        })
    }
}

/// Forwards bus events to the subscriber set until the hub goes away.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(ev) => set.emit_arc(Arc::new(ev)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    set.shutdown().await;
}

/// Factory for engine controllers sharing one bus, registry and set of backends.
pub struct EngineHub {
    cfg: HubConfig,
    bus: Bus,
    registry: Arc<SingletonRegistry>,
    backends: Backends,
    token: CancellationToken,
}

impl EngineHub {
    pub fn builder(cfg: HubConfig) -> EngineHubBuilder {
        EngineHubBuilder::new(cfg)
    }

    /// Creates a controller from the hub defaults overridden by `patch`.
    ///
    /// A non-deferred controller starts loading immediately.
    pub fn controller(&self, patch: EngineConfigPatch) -> Arc<EngineController> {
        let cfg = EngineConfig::with_defaults(&self.cfg).merged(&patch);
        let defer = cfg.defer;
        let controller = EngineController::new(
            cfg,
            Arc::clone(&self.registry),
            self.backends.clone(),
            self.bus.clone(),
        );
        if !defer {
            controller.load();
        }
        controller
    }

    /// Creates a store over a new controller.
    pub fn store(&self, patch: EngineConfigPatch) -> EngineStore {
        EngineStore::new(self.controller(patch))
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<SingletonRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HubConfig {
        &self.cfg
    }
}

impl Drop for EngineHub {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionMode;
    use crate::events::EventKind;
    use crate::testing::MockFactory;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().push(event.kind);
        }
    }

    #[derive(Default)]
    struct AlwaysPanics(Mutex<usize>);

    #[async_trait]
    impl Subscribe for AlwaysPanics {
        async fn on_event(&self, _event: &Event) {
            *self.0.lock() += 1;
            panic!("always");
        }
    }

    fn hub(factory: &Arc<MockFactory>, subs: Vec<Arc<dyn Subscribe>>) -> Arc<EngineHub> {
        EngineHub::builder(HubConfig {
            resource_url: "url0".into(),
            ..HubConfig::default()
        })
        .with_backends(Backends::new().with(ExecutionMode::WorkerIsolated, factory.clone()))
        .with_registry(Arc::new(SingletonRegistry::new()))
        .with_subscribers(subs)
        .build()
    }

    #[tokio::test]
    async fn test_non_deferred_controller_loads_on_creation() {
        let factory = MockFactory::arc();
        let hub = hub(&factory, Vec::new());

        let c = hub.controller(EngineConfigPatch::new());
        assert!(c.is_loading());
        c.load().settled().await.unwrap();

        assert_eq!(factory.urls(), vec!["url0"]);
        assert!(c.engine().is_some());
    }

    #[tokio::test]
    async fn test_deferred_controller_waits_for_load() {
        let factory = MockFactory::arc();
        let hub = hub(&factory, Vec::new());

        let c = hub.controller(EngineConfigPatch::new().defer(true));
        assert!(!c.is_loading());
        assert_eq!(factory.calls(), 0);
    }

    #[tokio::test]
    async fn test_controllers_share_the_hub_registry() {
        let factory = MockFactory::arc();
        let hub = hub(&factory, Vec::new());

        let a = hub.controller(EngineConfigPatch::new().singleton_key("viewer"));
        a.load().settled().await.unwrap();
        let b = hub.controller(EngineConfigPatch::new().singleton_key("viewer"));
        b.load().settled().await.unwrap();

        assert_eq!(hub.registry().refcount("viewer"), Some(2));
        assert_eq!(factory.calls(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_lifecycle_events() {
        let factory = MockFactory::arc();
        let recorder = Arc::new(Recorder::default());
        let hub = hub(&factory, vec![recorder.clone() as Arc<dyn Subscribe>]);

        let c = hub.controller(EngineConfigPatch::new());
        c.load().settled().await.unwrap();
        c.destroy();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let kinds = recorder.0.lock().clone();
        assert!(kinds.contains(&EventKind::LoadStarted));
        assert!(kinds.contains(&EventKind::EngineCreated));
        assert!(kinds.contains(&EventKind::EngineDestroyed));
        assert!(kinds.contains(&EventKind::ControllerDestroyed));
    }

    #[tokio::test]
    async fn test_panicking_subscriber_sees_one_report_per_event() {
        let factory = MockFactory::arc();
        let sub = Arc::new(AlwaysPanics::default());
        let hub = hub(&factory, vec![sub.clone() as Arc<dyn Subscribe>]);

        hub.bus().publish(Event::new(EventKind::LoadStarted));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The event itself, then its panic report.
        assert_eq!(*sub.0.lock(), 2);
    }

    #[test]
    fn test_build_without_runtime_is_degraded() {
        let factory = MockFactory::arc();
        let recorder = Arc::new(Recorder::default());
        let hub = hub(&factory, vec![recorder as Arc<dyn Subscribe>]);

        let c = hub.controller(EngineConfigPatch::new());
        assert!(!c.is_loading());
        assert!(c.error().is_none());
        assert_eq!(factory.calls(), 0);
    }
}
