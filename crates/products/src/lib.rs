//! Product catalog domain module.
//!
//! This crate contains the catalog's business rules: the record model, the
//! name rule, per-row errors and add/update/delete reconciliation. Everything
//! here is deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod reconcile;
pub mod row_error;

pub use product::{
    field, CandidateUpdate, CatalogEntry, ProductRecord, MAX_NAME_LEN, MSG_TOO_LONG_NAME,
};
pub use reconcile::{classify, contains, reconcile, Operation, Reconciliation, ReconciliationSets};
pub use row_error::RowError;
