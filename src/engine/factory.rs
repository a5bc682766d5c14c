//! # Engine construction strategies.
//!
//! An [`EngineFactory`] turns a resource locator (where the backend module
//! lives) and a [`Logger`](crate::Logger) into a live engine. Which factory a
//! controller uses is decided by its [`ExecutionMode`]:
//!
//! ```text
//! EngineConfig.mode ──► Backends::resolve(mode) ──► Arc<dyn EngineFactory>
//!                          ├─ InProcess      → engine runs on the caller's runtime
//!                          └─ WorkerIsolated → engine runs behind a worker, reached
//!                                              by message passing
//! ```
//!
//! The mapping is resolved when a controller is created and again when a reload
//! changes the mode. A mode without a registered factory fails the load with
//! [`ErrorCode::NotSupport`](crate::ErrorCode::NotSupport).

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::engine::handle::EngineRef;
use crate::engine::logger::LoggerRef;
use crate::tasks::EngineTask;

/// Where the engine executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// Engine lives in the consumer's own execution context.
    InProcess,
    /// Engine lives in a separate worker; the core only sees message replies.
    #[default]
    WorkerIsolated,
}

impl ExecutionMode {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutionMode::InProcess => "in_process",
            ExecutionMode::WorkerIsolated => "worker_isolated",
        }
    }
}

/// # Strategy that constructs engines.
pub trait EngineFactory: Send + Sync + 'static {
    /// Human-readable name (for logs/events).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Starts constructing an engine from the backend module at `resource_url`.
    fn create(&self, resource_url: &str, logger: LoggerRef) -> EngineTask<EngineRef>;

    /// Whether the current environment can host this backend at all.
    ///
    /// Returning `false` puts the controller into its degraded, non-loading state
    /// instead of failing. The default requires a tokio runtime on the calling thread.
    fn is_available(&self) -> bool {
        tokio::runtime::Handle::try_current().is_ok()
    }
}

/// Shared factory handle.
pub type FactoryRef = Arc<dyn EngineFactory>;

/// Closure-backed factory.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use enginevisor::{
///     EngineFactory, EngineHandle, EngineRef, EngineTask, FnFactory, LoggerRef, NoopLogger, TaskHelper,
/// };
///
/// struct Null;
/// impl EngineHandle for Null {
///     fn destroy(&self) -> EngineTask<bool> { TaskHelper::resolve(true) }
/// }
///
/// let factory = FnFactory::arc("null", |_url: &str, _logger: LoggerRef| {
///     TaskHelper::resolve(Arc::new(Null) as EngineRef)
/// });
/// let task = factory.create("https://example.invalid/pdfium.wasm", Arc::new(NoopLogger));
/// assert!(task.outcome().unwrap().is_ok());
/// assert_eq!(factory.name(), "null");
/// ```
pub struct FnFactory<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> FnFactory<F>
where
    F: Fn(&str, LoggerRef) -> EngineTask<EngineRef> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the factory and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> EngineFactory for FnFactory<F>
where
    F: Fn(&str, LoggerRef) -> EngineTask<EngineRef> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, resource_url: &str, logger: LoggerRef) -> EngineTask<EngineRef> {
        (self.f)(resource_url, logger)
    }
}

/// Factory per execution mode.
#[derive(Clone, Default)]
pub struct Backends {
    in_process: Option<FactoryRef>,
    worker: Option<FactoryRef>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory for `mode`.
    pub fn with(mut self, mode: ExecutionMode, factory: FactoryRef) -> Self {
        self.set(mode, factory);
        self
    }

    /// Registers (or replaces) the factory for `mode`.
    pub fn set(&mut self, mode: ExecutionMode, factory: FactoryRef) {
        match mode {
            ExecutionMode::InProcess => self.in_process = Some(factory),
            ExecutionMode::WorkerIsolated => self.worker = Some(factory),
        }
    }

    /// Returns the factory registered for `mode`.
    pub fn resolve(&self, mode: ExecutionMode) -> Option<FactoryRef> {
        match mode {
            ExecutionMode::InProcess => self.in_process.clone(),
            ExecutionMode::WorkerIsolated => self.worker.clone(),
        }
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("in_process", &self.in_process.as_ref().map(|b| b.name().to_string()))
            .field("worker", &self.worker.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFactory;

    #[test]
    fn test_resolve_by_mode() {
        let direct = MockFactory::arc();
        let backends = Backends::new().with(ExecutionMode::InProcess, direct.clone());

        let resolved = backends.resolve(ExecutionMode::InProcess).unwrap();
        assert_eq!(resolved.name(), direct.name());
        assert!(backends.resolve(ExecutionMode::WorkerIsolated).is_none());
    }

    #[test]
    fn test_set_replaces_factory() {
        let mut backends = Backends::new();
        backends.set(
            ExecutionMode::WorkerIsolated,
            FnFactory::arc("first", |_: &str, _: LoggerRef| {
                crate::TaskHelper::reject(crate::ErrorReason::initialization("first"))
            }),
        );
        backends.set(
            ExecutionMode::WorkerIsolated,
            FnFactory::arc("second", |_: &str, _: LoggerRef| {
                crate::TaskHelper::reject(crate::ErrorReason::initialization("second"))
            }),
        );

        let resolved = backends.resolve(ExecutionMode::WorkerIsolated).unwrap();
        assert_eq!(resolved.name(), "second");
    }

    #[test]
    fn test_default_mode_is_worker() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::WorkerIsolated);
        assert_eq!(ExecutionMode::InProcess.as_label(), "in_process");
    }
}
