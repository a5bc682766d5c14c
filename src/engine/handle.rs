//! # Engine capability interface.
//!
//! [`EngineHandle`] is the opaque, versioned operation set of a document engine.
//! This crate never builds an engine itself: a construction strategy
//! ([`EngineFactory`](crate::EngineFactory)) produces one and the lifecycle
//! runtime only manages how long it lives.
//!
//! Every operation answers with an [`EngineTask`]. Operations an engine does
//! not implement reject with [`ErrorCode::NotSupport`](crate::ErrorCode::NotSupport)
//! by default, so a backend only overrides what it offers. [`EngineHandle::destroy`]
//! has no default: every engine must say how it is torn down, and must tolerate
//! being asked more than once.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::ErrorReason;
use crate::tasks::{EngineTask, TaskHelper};

/// Revision of the [`EngineHandle`] operation set.
pub const ENGINE_API_VERSION: u32 = 1;

/// Shared handle to a live engine.
pub type EngineRef = Arc<dyn EngineHandle>;

/// Features an engine may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdfEngineFeature {
    RenderPage,
    RenderPageRect,
    Thumbnails,
    Bookmarks,
    Annotations,
}

/// Operations allowed on a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PdfEngineOperation {
    Create,
    Read,
    Update,
    Delete,
}

/// Raw document bytes with a caller-chosen id.
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub id: String,
    pub content: Bytes,
}

/// Size and position of a page inside an open document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPageObject {
    pub index: usize,
    pub width: f32,
    pub height: f32,
}

/// Document opened by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfDocumentObject {
    pub id: String,
    pub page_count: usize,
    pub pages: Vec<PdfPageObject>,
}

/// Document information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfMetadataObject {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub producer: Option<String>,
    pub creator: Option<String>,
}

fn unsupported<R>(operation: &'static str) -> EngineTask<R> {
    TaskHelper::reject(ErrorReason::not_supported(operation))
}

/// # Document engine capability.
///
/// # Example
/// ```
/// use enginevisor::{EngineHandle, EngineTask, ErrorCode, PdfEngineFeature, TaskHelper};
///
/// struct Null;
///
/// impl EngineHandle for Null {
///     fn destroy(&self) -> EngineTask<bool> {
///         TaskHelper::resolve(true)
///     }
/// }
///
/// let engine = Null;
/// let supported = engine.is_support(PdfEngineFeature::Annotations);
/// assert_eq!(supported.outcome().unwrap().as_ref().unwrap_err().code, ErrorCode::NotSupport);
/// ```
pub trait EngineHandle: Send + Sync + 'static {
    /// Revision of the operation set this engine implements.
    fn api_version(&self) -> u32 {
        ENGINE_API_VERSION
    }

    /// Checks which operations the engine supports for `feature`.
    fn is_support(&self, feature: PdfEngineFeature) -> EngineTask<Vec<PdfEngineOperation>> {
        let _ = feature;
        unsupported("is_support")
    }

    /// Initializes the engine. Engines that are ready on construction resolve `true`.
    fn initialize(&self) -> EngineTask<bool> {
        TaskHelper::resolve(true)
    }

    /// Tears the engine down.
    ///
    /// Must be idempotent: calling it on an already destroyed engine is a no-op.
    fn destroy(&self) -> EngineTask<bool>;

    /// Opens a document from memory.
    fn open_document_buffer(&self, file: PdfFile, password: &str) -> EngineTask<PdfDocumentObject> {
        let _ = (file, password);
        unsupported("open_document_buffer")
    }

    /// Reads the document information dictionary.
    fn get_metadata(&self, doc: &PdfDocumentObject) -> EngineTask<PdfMetadataObject> {
        let _ = doc;
        unsupported("get_metadata")
    }

    /// Extracts the text of the given pages, in order.
    fn extract_text(&self, doc: &PdfDocumentObject, page_indexes: &[usize]) -> EngineTask<String> {
        let _ = (doc, page_indexes);
        unsupported("extract_text")
    }

    /// Serializes the document, including pending edits.
    fn save_as_copy(&self, doc: &PdfDocumentObject) -> EngineTask<Bytes> {
        let _ = doc;
        unsupported("save_as_copy")
    }

    /// Closes a document and frees its resources.
    fn close_document(&self, doc: &PdfDocumentObject) -> EngineTask<bool> {
        let _ = doc;
        unsupported("close_document")
    }
}

/// True if both references point at the same engine instance.
pub fn same_engine(a: &EngineRef, b: &EngineRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Tears an engine down and logs a rejected teardown.
pub(crate) fn teardown(engine: &EngineRef) {
    engine.destroy().wait(
        |_| {},
        |reason| tracing::warn!(reason = %reason, "engine teardown rejected"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::MockEngine;

    #[test]
    fn test_default_operations_are_unsupported() {
        let engine = MockEngine::new(1);
        let doc = PdfDocumentObject {
            id: "doc".into(),
            page_count: 0,
            pages: Vec::new(),
        };

        let text = engine.extract_text(&doc, &[0]);
        let Some(Err(reason)) = text.outcome() else {
            panic!("expected rejection");
        };
        assert_eq!(reason.code, ErrorCode::NotSupport);
        assert_eq!(reason.message, "extract_text");
        assert_eq!(engine.api_version(), ENGINE_API_VERSION);
    }

    #[test]
    fn test_same_engine_compares_instances() {
        let a: EngineRef = Arc::new(MockEngine::new(1));
        let b: EngineRef = Arc::new(MockEngine::new(2));

        assert!(same_engine(&a, &a.clone()));
        assert!(!same_engine(&a, &b));
    }

    #[test]
    fn test_teardown_invokes_destroy() {
        let engine = Arc::new(MockEngine::new(1));
        let as_ref: EngineRef = engine.clone();

        teardown(&as_ref);
        teardown(&as_ref);
        assert_eq!(engine.destroy_calls(), 2);
    }
}
