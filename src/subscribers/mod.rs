//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used by an [`EngineHub`](crate::EngineHub) to deliver events
//! published on its [`Bus`](crate::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   EngineController ── publish(Event) ──► Bus ──► hub listener ──► SubscriberSet
//!                                                                     │
//!                                                        ┌────────────┼──────────┐
//!                                                        ▼            ▼          ▼
//!                                                    LogWriter     Metrics    Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
