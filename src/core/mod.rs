//! Lifecycle core: registry, controllers, stores and the hub that creates them.
//!
//! The public entry point is [`EngineHub`], which creates [`EngineController`]s
//! and [`EngineStore`]s that share one event bus and one [`SingletonRegistry`].
//!
//! Internal modules:
//! - [`config`]: hub and engine configuration, reload patches;
//! - [`registry`]: process-wide reference-counted engines with construction coalescing;
//! - [`state`]: controller state machine values;
//! - [`controller`]: load/reload/destroy of one consumer's engine;
//! - [`store`]: observer-counted projection of a controller;
//! - [`hub`]: controller factory and event delivery.

mod config;
mod controller;
mod hub;
mod registry;
mod state;
mod store;

pub use config::{
    DEFAULT_BUS_CAPACITY, DEFAULT_RESOURCE_URL, EngineConfig, EngineConfigPatch, HubConfig,
    PDFIUM_VERSION,
};
pub use controller::{EngineController, LoadTask};
pub use hub::{EngineHub, EngineHubBuilder};
pub use registry::{Acquire, Completion, ConstructionTicket, Lease, Release, SingletonRegistry};
pub use state::EngineState;
pub use store::{EngineStore, Subscription};
