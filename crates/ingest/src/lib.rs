//! Spreadsheet ingestion: decode a seller's xlsx upload into catalog candidates.
//!
//! Layout is fixed: first sheet, no header row, columns
//! `offer_id | name | price | quantity | available`.

pub mod error;
pub mod parser;

pub use error::ParseError;
pub use parser::{ParsedSheet, TabularParser};
