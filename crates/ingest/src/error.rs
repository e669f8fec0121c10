use thiserror::Error;

use offerbook_core::{Classify, ErrorKind};

/// Whole-document failures. Any of these aborts the import before a single
/// row is processed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("cannot read document")]
    FailedToRead,

    #[error("empty document")]
    EmptyDoc,

    #[error("empty sheet")]
    EmptySheet,

    #[error("offer_id column has invalid value(s)")]
    InvalidIds,

    #[error("sheet contain offer_id duplicates")]
    HasDuplicates,
}

impl Classify for ParseError {
    fn kind(&self) -> ErrorKind {
        match self {
            ParseError::HasDuplicates => ErrorKind::Conflict,
            ParseError::FailedToRead
            | ParseError::EmptyDoc
            | ParseError::EmptySheet
            | ParseError::InvalidIds => ErrorKind::BadInput,
        }
    }
}
