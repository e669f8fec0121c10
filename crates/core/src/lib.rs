//! `offerbook-core` — shared catalog primitives.
//!
//! This crate contains **pure domain** building blocks (no infrastructure concerns):
//! identifiers and the error taxonomy every other crate classifies into.

pub mod error;
pub mod id;

pub use error::{Classify, DomainError, ErrorKind};
pub use id::{OfferId, SellerId};
