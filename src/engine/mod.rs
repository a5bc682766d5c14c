//! External collaborators of the lifecycle runtime.
//!
//! ## Contents
//! - [`EngineHandle`] the engine capability (opaque to the runtime except for teardown)
//! - [`EngineFactory`], [`FnFactory`], [`Backends`] construction strategies per [`ExecutionMode`]
//! - [`Logger`] sink handed to engines at construction

mod factory;
mod handle;
mod logger;

pub use factory::{Backends, EngineFactory, ExecutionMode, FactoryRef, FnFactory};
pub(crate) use handle::teardown;
pub use handle::{
    ENGINE_API_VERSION, EngineHandle, EngineRef, PdfDocumentObject, PdfEngineFeature,
    PdfEngineOperation, PdfFile, PdfMetadataObject, PdfPageObject, same_engine,
};
pub use logger::{AllLogger, Level, Logger, LoggerRef, NoopLogger, TracingLogger};
