//! Domain error model and the closed error taxonomy shared by every layer.

use thiserror::Error;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// malformed identifiers). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A field value failed a domain rule.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Closed classification of batch-level failures.
///
/// Every fatal error in the pipeline maps onto exactly one kind, so the
/// transport layer can translate kinds to responses with an exhaustive match.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input itself is unusable (unreadable document, bad id column, ...).
    BadInput,
    /// The input conflicts with itself (duplicate offer ids in one sheet).
    Conflict,
    /// Storage could not complete the request; nothing was written.
    StorageFailure,
    /// The request carried nothing to do.
    EmptyRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadInput => "bad_input",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StorageFailure => "storage_failure",
            ErrorKind::EmptyRequest => "empty_request",
        }
    }
}

/// Implemented by every fatal error type so callers can classify without
/// inspecting variants they do not own.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
