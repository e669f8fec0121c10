use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use offerbook_core::{Classify, ErrorKind, OfferId, SellerId};
use offerbook_products::{CatalogEntry, ReconciliationSets};

/// Hard cap on rows returned by a filtered read.
pub const DEFAULT_LIMIT: usize = 100;

/// Catalog store operation error.
///
/// These are **infrastructure errors**. The underlying driver error is logged
/// where it happens and never carried to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Nothing to add, update or delete.
    #[error("empty request")]
    EmptyRequest,

    /// A statement could not be built from the request (e.g. a value that does
    /// not fit the schema's column type).
    #[error("query builder failed")]
    QueryBuildFailed,

    /// Starting or committing the transaction failed.
    #[error("transaction failed")]
    TxFailed,

    #[error("failed to execute query")]
    QueryExecFailed,

    /// The operation deadline elapsed; an open transaction was rolled back.
    #[error("storage operation timed out")]
    TimedOut,
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::EmptyRequest => ErrorKind::EmptyRequest,
            StoreError::QueryBuildFailed
            | StoreError::TxFailed
            | StoreError::QueryExecFailed
            | StoreError::TimedOut => ErrorKind::StorageFailure,
        }
    }
}

/// Filter for catalog reads. Empty lists and a blank substring mean
/// "no constraint" on that column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub seller_ids: Vec<SellerId>,
    pub offer_ids: Vec<OfferId>,
    pub substring: String,
}

impl ProductFilter {
    /// The name substring to match, trimmed; `None` when blank.
    pub fn substring(&self) -> Option<&str> {
        let s = self.substring.trim();
        (!s.is_empty()).then_some(s)
    }

    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        (self.seller_ids.is_empty() || self.seller_ids.contains(&entry.seller_id))
            && (self.offer_ids.is_empty() || self.offer_ids.contains(&entry.offer_id))
            && self.substring().is_none_or(|s| entry.name.contains(s))
    }
}

/// Seller-scoped persistence of the catalog.
///
/// Implementations must:
/// - scope every write to `seller_id`
/// - apply an add/update/delete set atomically (all or nothing)
/// - refuse an empty set with `StoreError::EmptyRequest` without starting a transaction
/// - report the number of rows actually deleted, not the number requested
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Offer ids currently stored for a seller, ascending.
    async fn existing_offer_ids(&self, seller_id: SellerId) -> Result<Vec<OfferId>, StoreError>;

    /// Upsert `to_add ∪ to_update` and delete `to_delete` in one transaction.
    ///
    /// Returns the number of rows actually deleted.
    async fn apply(&self, seller_id: SellerId, sets: &ReconciliationSets) -> Result<u64, StoreError>;

    /// Filtered read ordered by `(seller_id, offer_id)`, capped at [`DEFAULT_LIMIT`].
    async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, StoreError>;
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn existing_offer_ids(&self, seller_id: SellerId) -> Result<Vec<OfferId>, StoreError> {
        (**self).existing_offer_ids(seller_id).await
    }

    async fn apply(&self, seller_id: SellerId, sets: &ReconciliationSets) -> Result<u64, StoreError> {
        (**self).apply(seller_id, sets).await
    }

    async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, StoreError> {
        (**self).products_by_filter(filter).await
    }
}
