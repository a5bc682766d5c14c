//! # Hub and engine configuration.
//!
//! - [`HubConfig`] hub-wide settings (bus capacity, defaults for new controllers).
//! - [`EngineConfig`] per-controller settings.
//! - [`EngineConfigPatch`] partial override merged by `reload()`.
//!
//! Config is used in two ways:
//! 1. **Hub creation**: `EngineHub::builder(hub_config)`
//! 2. **Controller defaults**: `EngineConfig::with_defaults(&hub_config)` then a patch
//!
//! ## Sentinel values
//! - `singleton_key = ""` → not shared (the controller owns a private engine)
//! - `bus_capacity = 0` → clamped to 1

use std::fmt;
use std::sync::Arc;

use crate::engine::{AllLogger, ExecutionMode, LoggerRef};

/// Pdfium release the default resource locator points at.
pub const PDFIUM_VERSION: &str = "1.4.1";

/// Default location of the backend module.
pub const DEFAULT_RESOURCE_URL: &str =
    "https://cdn.jsdelivr.net/npm/@embedpdf/pdfium@1.4.1/dist/pdfium.wasm";

/// Default capacity of the hub event bus.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Hub-wide configuration.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `resource_url`: backend module used when a controller does not override it
/// - `mode`: execution mode used when a controller does not override it
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Subscribers that lag behind more than `bus_capacity` messages skip older items.
    pub bus_capacity: usize,

    /// Default backend module location for new controllers.
    pub resource_url: String,

    /// Default execution mode for new controllers.
    pub mode: ExecutionMode,
}

impl HubConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for HubConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `resource_url = DEFAULT_RESOURCE_URL`
    /// - `mode = ExecutionMode::WorkerIsolated`
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
            resource_url: DEFAULT_RESOURCE_URL.to_string(),
            mode: ExecutionMode::default(),
        }
    }
}

/// Per-controller configuration.
///
/// ## Field semantics
/// - `resource_url`: where the construction strategy fetches the backend module
/// - `mode`: which construction strategy is used
/// - `logger`: sink handed to the engine at construction
/// - `singleton_key`: registry sharing key (`""` = not shared)
/// - `defer`: stay idle until the first observer attaches or `load()` is called
#[derive(Clone)]
pub struct EngineConfig {
    pub resource_url: String,
    pub mode: ExecutionMode,
    pub logger: LoggerRef,
    pub singleton_key: String,
    pub defer: bool,
}

impl EngineConfig {
    /// Derives a controller configuration from hub defaults.
    pub fn with_defaults(hub: &HubConfig) -> Self {
        Self {
            resource_url: hub.resource_url.clone(),
            mode: hub.mode,
            ..Self::default()
        }
    }

    /// Returns the registry sharing key as an `Option`.
    ///
    /// - `None` → private engine
    /// - `Some(key)` → engine shared through the registry under `key`
    #[inline]
    pub fn sharing_key(&self) -> Option<&str> {
        if self.singleton_key.is_empty() {
            None
        } else {
            Some(&self.singleton_key)
        }
    }

    /// Returns a copy with `patch` applied.
    pub fn merged(&self, patch: &EngineConfigPatch) -> Self {
        let mut cfg = self.clone();
        patch.apply(&mut cfg);
        cfg
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `resource_url = DEFAULT_RESOURCE_URL`
    /// - `mode = ExecutionMode::WorkerIsolated`
    /// - `logger = AllLogger::default()` (no children)
    /// - `singleton_key = ""` (not shared)
    /// - `defer = false`
    fn default() -> Self {
        Self {
            resource_url: DEFAULT_RESOURCE_URL.to_string(),
            mode: ExecutionMode::default(),
            logger: Arc::new(AllLogger::default()),
            singleton_key: String::new(),
            defer: false,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("resource_url", &self.resource_url)
            .field("mode", &self.mode)
            .field("singleton_key", &self.singleton_key)
            .field("defer", &self.defer)
            .finish_non_exhaustive()
    }
}

/// Partial override of an [`EngineConfig`]; `None` fields keep the current value.
#[derive(Clone, Default)]
pub struct EngineConfigPatch {
    pub resource_url: Option<String>,
    pub mode: Option<ExecutionMode>,
    pub logger: Option<LoggerRef>,
    pub singleton_key: Option<String>,
    pub defer: Option<bool>,
}

impl EngineConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_url(mut self, url: impl Into<String>) -> Self {
        self.resource_url = Some(url.into());
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn logger(mut self, logger: LoggerRef) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Shares the engine under `key`; an empty key turns sharing off.
    pub fn singleton_key(mut self, key: impl Into<String>) -> Self {
        self.singleton_key = Some(key.into());
        self
    }

    pub fn defer(mut self, defer: bool) -> Self {
        self.defer = Some(defer);
        self
    }

    /// True if the patch overrides nothing.
    pub fn is_empty(&self) -> bool {
        self.resource_url.is_none()
            && self.mode.is_none()
            && self.logger.is_none()
            && self.singleton_key.is_none()
            && self.defer.is_none()
    }

    /// Writes every overridden field into `cfg`.
    pub fn apply(&self, cfg: &mut EngineConfig) {
        if let Some(url) = &self.resource_url {
            cfg.resource_url = url.clone();
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(logger) = &self.logger {
            cfg.logger = Arc::clone(logger);
        }
        if let Some(key) = &self.singleton_key {
            cfg.singleton_key = key.clone();
        }
        if let Some(defer) = self.defer {
            cfg.defer = defer;
        }
    }
}

impl fmt::Debug for EngineConfigPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfigPatch")
            .field("resource_url", &self.resource_url)
            .field("mode", &self.mode)
            .field("logger", &self.logger.is_some())
            .field("singleton_key", &self.singleton_key)
            .field("defer", &self.defer)
            .finish()
    }
}
