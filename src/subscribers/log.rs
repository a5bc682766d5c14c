//! # Logging subscriber.
//!
//! [`LogWriter`] renders lifecycle events through `tracing`, one line per event:
//!
//! ```text
//! DEBUG load started controller=3 mode=worker_isolated key=viewer
//! DEBUG engine created controller=3 factory=pdfium-worker
//! DEBUG engine adopted controller=4 key=viewer refs=2
//! WARN  load failed controller=5 reason="initialization: cannot fetch module"
//! DEBUG engine released controller=3 key=viewer refs=1
//! ```
//!
//! Install a `tracing` subscriber in the host application to see the output.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Lifecycle event logger.
///
/// Enabled via the `logging` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let controller = e.controller.unwrap_or_default();
        let key = e.key.as_deref().unwrap_or("");
        match e.kind {
            EventKind::LoadStarted => {
                let mode = e.mode.map(|m| m.as_label()).unwrap_or("");
                tracing::debug!(controller, mode, key, "load started");
            }
            EventKind::EnvironmentUnavailable => {
                tracing::debug!(controller, "environment cannot host the backend; staying idle");
            }
            EventKind::EngineAdopted => {
                tracing::debug!(controller, key, refs = e.refs, "engine adopted");
            }
            EventKind::ConstructionJoined => {
                tracing::debug!(controller, key, "joined in-flight construction");
            }
            EventKind::EngineCreated => {
                let factory = e.source.as_deref().unwrap_or("");
                tracing::debug!(controller, factory, key, "engine created");
            }
            EventKind::LoadFailed => {
                let reason = e.reason.as_deref().unwrap_or("");
                tracing::warn!(controller, key, reason, "load failed");
            }
            EventKind::EngineDiscarded => {
                tracing::debug!(controller, key, "late engine discarded");
            }
            EventKind::EngineReleased => {
                tracing::debug!(controller, key, refs = e.refs, "engine released");
            }
            EventKind::EngineDestroyed => {
                tracing::debug!(controller, "engine destroyed");
            }
            EventKind::ReloadRequested => {
                tracing::debug!(controller, key, "reload requested");
            }
            EventKind::ControllerDestroyed => {
                tracing::debug!(controller, "controller destroyed");
            }
            EventKind::StateChanged => {
                tracing::trace!(controller, state = e.state.unwrap_or(""), "state changed");
            }
            EventKind::StoreActivated => {
                tracing::trace!(controller, "store activated");
            }
            EventKind::StoreDeactivated => {
                tracing::trace!(controller, "store deactivated");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                let reason = e.reason.as_deref().unwrap_or("");
                tracing::warn!(subscriber = e.source.as_deref().unwrap_or(""), reason, "subscriber trouble");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
