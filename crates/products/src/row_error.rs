use serde::{Deserialize, Serialize};
use thiserror::Error;

use offerbook_core::DomainError;

/// A non-fatal, per-row problem. Never aborts the batch it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("product invalid: row={row}, field={field}, err={message}")]
pub struct RowError {
    /// 1-based line number in the source.
    pub row: u64,
    /// Column name of the offending field.
    pub field: String,
    #[serde(rename = "errMsg")]
    pub message: String,
}

impl RowError {
    pub fn new(row: u64, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Attribute a domain validation failure to a row.
    pub fn from_domain(row: u64, err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => Self::new(row, field, message),
            DomainError::InvalidId(message) => Self::new(row, crate::field::OFFER_ID, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_message_as_err_msg() {
        let err = RowError::new(1, "name", "too long name");
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"row":1,"field":"name","errMsg":"too long name"}"#
        );
    }

    #[test]
    fn keeps_field_of_validation_error() {
        let err = RowError::from_domain(3, DomainError::validation("name", "too long name"));
        assert_eq!(err, RowError::new(3, "name", "too long name"));
    }
}
