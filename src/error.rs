//! Error types used by engine tasks and the lifecycle runtime.
//!
//! This module defines:
//!
//! - [`ErrorCode`] closed set of failure codes reported by engine backends.
//! - [`ErrorReason`] rejection payload of every [`EngineTask`](crate::EngineTask).
//! - [`SettleError`] misuse of a [`Task`](crate::Task) (settling it twice).
//!
//! Backend failures never travel as panics: an engine operation returns a task and
//! rejects it with an [`ErrorReason`]. Callers branch on [`ErrorReason::code`].
//!
//! All types provide `as_label` (stable snake_case, for logs/metrics) and
//! `as_message` helpers.

use std::any::Any;
use std::borrow::Cow;

use thiserror::Error;

/// # Failure codes reported by engine backends.
///
/// The first block mirrors the pdfium `FPDF_ERR_*` codes, the rest are
/// operation-specific codes raised by engine wrappers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No error.
    #[error("ok")]
    Ok,
    /// Unknown error.
    #[error("unknown error")]
    Unknown,
    /// File not found or could not be opened.
    #[error("file not found")]
    NotFound,
    /// File not in PDF format or corrupted.
    #[error("wrong format")]
    WrongFormat,
    /// Password required or incorrect password.
    #[error("password required or incorrect")]
    Password,
    /// Unsupported security scheme.
    #[error("unsupported security scheme")]
    Security,
    /// Page not found or content error.
    #[error("page error")]
    PageError,
    #[error("xfa load failed")]
    XfaLoad,
    #[error("xfa layout failed")]
    XfaLayout,
    /// Operation was cancelled by its producer.
    #[error("cancelled")]
    Cancelled,
    /// Engine construction or initialization failed.
    #[error("initialization failed")]
    Initialization,
    /// Engine is not ready to serve requests.
    #[error("not ready")]
    NotReady,
    /// Operation or execution mode is not supported.
    #[error("not supported")]
    NotSupport,
    #[error("cannot load document")]
    LoadDoc,
    #[error("document not open")]
    DocNotOpen,
    #[error("cannot close document")]
    CantCloseDoc,
    #[error("cannot create new document")]
    CantCreateNewDoc,
    #[error("cannot import pages")]
    CantImportPages,
    #[error("cannot create annotation")]
    CantCreateAnnot,
    #[error("cannot set annotation rect")]
    CantSetAnnotRect,
    #[error("cannot set annotation content")]
    CantSetAnnotContent,
    #[error("cannot remove ink list")]
    CantRemoveInkList,
    #[error("cannot add ink stroke")]
    CantAddInkStoke,
    #[error("cannot read attachment size")]
    CantReadAttachmentSize,
    #[error("cannot read attachment content")]
    CantReadAttachmentContent,
    #[error("cannot focus annotation")]
    CantFocusAnnot,
    #[error("cannot select text")]
    CantSelectText,
    #[error("cannot select option")]
    CantSelectOption,
    #[error("cannot check field")]
    CantCheckField,
}

impl ErrorCode {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use enginevisor::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::NotSupport.as_label(), "not_support");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::Unknown => "unknown",
            ErrorCode::NotFound => "not_found",
            ErrorCode::WrongFormat => "wrong_format",
            ErrorCode::Password => "password",
            ErrorCode::Security => "security",
            ErrorCode::PageError => "page_error",
            ErrorCode::XfaLoad => "xfa_load",
            ErrorCode::XfaLayout => "xfa_layout",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Initialization => "initialization",
            ErrorCode::NotReady => "not_ready",
            ErrorCode::NotSupport => "not_support",
            ErrorCode::LoadDoc => "load_doc",
            ErrorCode::DocNotOpen => "doc_not_open",
            ErrorCode::CantCloseDoc => "cant_close_doc",
            ErrorCode::CantCreateNewDoc => "cant_create_new_doc",
            ErrorCode::CantImportPages => "cant_import_pages",
            ErrorCode::CantCreateAnnot => "cant_create_annot",
            ErrorCode::CantSetAnnotRect => "cant_set_annot_rect",
            ErrorCode::CantSetAnnotContent => "cant_set_annot_content",
            ErrorCode::CantRemoveInkList => "cant_remove_ink_list",
            ErrorCode::CantAddInkStoke => "cant_add_ink_stroke",
            ErrorCode::CantReadAttachmentSize => "cant_read_attachment_size",
            ErrorCode::CantReadAttachmentContent => "cant_read_attachment_content",
            ErrorCode::CantFocusAnnot => "cant_focus_annot",
            ErrorCode::CantSelectText => "cant_select_text",
            ErrorCode::CantSelectOption => "cant_select_option",
            ErrorCode::CantCheckField => "cant_check_field",
        }
    }
}

/// # Rejection reason of an engine task.
///
/// Pairs a closed [`ErrorCode`] with a free-form message. Cheap to clone, so
/// every observer of a rejected task receives its own copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ErrorReason {
    /// Failure classification.
    pub code: ErrorCode,
    /// Human-readable details.
    pub message: Cow<'static, str>,
}

impl ErrorReason {
    /// Creates a reason from a code and a message.
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for an [`ErrorCode::Cancelled`] reason.
    ///
    /// Cancellation is not a separate terminal state of a task; it is a rejection
    /// carrying this code.
    pub fn cancelled(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }

    /// Shorthand for an [`ErrorCode::NotSupport`] reason.
    pub fn not_supported(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::NotSupport, message)
    }

    /// Shorthand for an [`ErrorCode::Initialization`] reason.
    pub fn initialization(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Initialization, message)
    }

    /// Reason for a producer that panicked instead of settling.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::new(ErrorCode::Unknown, format!("producer panicked: {}", panic_message(payload)))
    }

    /// True if the producer aborted the operation.
    ///
    /// # Example
    /// ```
    /// use enginevisor::ErrorReason;
    ///
    /// assert!(ErrorReason::cancelled("superseded").is_cancelled());
    /// assert!(!ErrorReason::not_supported("render").is_cancelled());
    /// ```
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        self.code.as_label()
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        format!("{}: {}", self.code.as_label(), self.message)
    }
}

/// Extracts the message of a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// # Errors produced by misusing a [`Task`](crate::Task).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleError {
    /// The task had already been resolved or rejected; the first outcome stands.
    #[error("task already settled ({state})")]
    AlreadySettled {
        /// Label of the outcome that was kept (`"resolved"` or `"rejected"`).
        state: &'static str,
    },
}

impl SettleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use enginevisor::SettleError;
    ///
    /// let err = SettleError::AlreadySettled { state: "resolved" };
    /// assert_eq!(err.as_label(), "task_already_settled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SettleError::AlreadySettled { .. } => "task_already_settled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SettleError::AlreadySettled { state } => format!("already settled as {state}"),
        }
    }
}
