//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by controllers, stores and subscriber
//! workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `EngineController`, `EngineStore`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `EngineHub` listener (fans out to `SubscriberSet`), tests, and any
//!   caller holding a `Bus::subscribe()` receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
