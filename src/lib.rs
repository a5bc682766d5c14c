//! # enginevisor
//!
//! **Enginevisor** acquires, shares and tears down expensive, stateful
//! document-engine handles on behalf of many independent consumers in one process.
//!
//! Every fallible engine operation is represented by a settle-once [`Task`].
//! Each consumer owns an [`EngineController`] that loads its engine through a
//! construction strategy ([`EngineFactory`]) or adopts one from the process-wide
//! [`SingletonRegistry`] when it is configured with a sharing key.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ EngineStore  │   │ EngineStore  │   │  (direct use)│
//!     │ (observers)  │   │ (observers)  │   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Controller  │   │  Controller  │   │  Controller  │
//!     │ key="viewer" │   │ key="viewer" │   │ (private)    │
//!     └┬───────┬─────┘   └┬───────┬─────┘   └┬───────┬─────┘
//!      │       │ adopt /  │       │          │       │ create
//!      │       ▼ construct▼       │          │       ▼
//!      │  ┌────────────────────┐  │          │  ┌──────────────┐
//!      │  │ SingletonRegistry  │  │          │  │ EngineFactory│
//!      │  │ viewer → (eng, 2)  │──┼──────────┼─►│ per mode     │
//!      │  └────────────────────┘  │          │  └──────────────┘
//!      │ Publishes                │          │
//!      ▼                          ▼          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                  (capacity: HubConfig::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │     (in EngineHub)     │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                      worker1   worker2   workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! EngineHub::controller(patch) ──► EngineController (Idle)
//!
//! load()
//!   ├─► memoized? ─► same LoadTask
//!   ├─► no runtime / backend unavailable ─► Idle (degraded)
//!   ├─► Loading
//!   │     ├─ registry has key   ─► adopt + retain      ─► Ready
//!   │     ├─ key in construction ─► join shared task    ─► Ready | Failed
//!   │     └─ otherwise          ─► factory.create(url) ─► Ready | Failed
//!   │
//! reload(patch) ─► merge, release/teardown, Idle, load()
//! destroy()     ─► release/teardown, Destroyed (terminal)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                              |
//! |-------------------|-----------------------------------------------------------------|-------------------------------------------------|
//! | **Tasks**         | Settle-once results with replay for late observers.             | [`Task`], [`TaskHelper`], [`EngineTask`]        |
//! | **Engines**       | Capability interface and construction strategies.               | [`EngineHandle`], [`EngineFactory`], [`Backends`] |
//! | **Lifecycle**     | Load/reload/destroy state machine with stale-result discard.    | [`EngineController`], [`EngineState`]           |
//! | **Sharing**       | Reference-counted engines per key with construction coalescing. | [`SingletonRegistry`]                           |
//! | **Projection**    | First observer activates, last observer destroys.               | [`EngineStore`], [`Subscription`]               |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).          | [`Subscribe`], [`Event`]                        |
//! | **Errors**        | Closed set of engine failure codes.                             | [`ErrorCode`], [`ErrorReason`], [`SettleError`] |
//! | **Configuration** | Hub defaults and per-controller overrides.                      | [`HubConfig`], [`EngineConfig`]                 |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders events through `tracing`.
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
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn enginevisor::Subscribe>> = vec![Arc::new(enginevisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn enginevisor::Subscribe>> = Vec::new();
//!
//!     let factory = FnFactory::arc("null", |_: &str, _: LoggerRef| {
//!         TaskHelper::resolve(Arc::new(Null) as EngineRef)
//!     });
//!     let hub = EngineHub::builder(HubConfig::default())
//!         .with_subscribers(subs)
//!         .with_backends(Backends::new().with(ExecutionMode::WorkerIsolated, factory))
//!         .with_registry(Arc::new(SingletonRegistry::new()))
//!         .build();
//!
//!     // Deferred: nothing loads until the first observer attaches.
//!     let store = hub.store(EngineConfigPatch::new().defer(true));
//!     let sub = store.subscribe(|engine| println!("engine present: {}", engine.is_some()));
//!     store.controller().load().settled().await.unwrap();
//!     assert!(store.controller().engine().is_some());
//!
//!     // Last observer leaving destroys the controller.
//!     sub.unsubscribe();
//!     assert!(store.controller().state().is_destroyed());
//! }
//! ```

mod core;
mod engine;
mod error;
mod events;
mod subscribers;
mod tasks;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use core::{
    Acquire, Completion, ConstructionTicket, DEFAULT_BUS_CAPACITY, DEFAULT_RESOURCE_URL,
    EngineConfig, EngineConfigPatch, EngineController, EngineHub, EngineHubBuilder, EngineState,
    EngineStore, HubConfig, Lease, LoadTask, PDFIUM_VERSION, Release, SingletonRegistry,
    Subscription,
};
pub use engine::{
    AllLogger, Backends, ENGINE_API_VERSION, EngineFactory, EngineHandle, EngineRef,
    ExecutionMode, FactoryRef, FnFactory, Level, Logger, LoggerRef, NoopLogger,
    PdfDocumentObject, PdfEngineFeature, PdfEngineOperation, PdfFile, PdfMetadataObject,
    PdfPageObject, TracingLogger, same_engine,
};
pub use error::{ErrorCode, ErrorReason, SettleError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{EngineTask, Task, TaskHelper, TaskStatus};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
