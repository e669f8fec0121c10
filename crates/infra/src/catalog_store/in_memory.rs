use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use offerbook_core::{OfferId, SellerId};
use offerbook_products::{CatalogEntry, ReconciliationSets};

use super::r#trait::{CatalogStore, ProductFilter, StoreError, DEFAULT_LIMIT};

/// In-memory seller catalogs.
///
/// Intended for tests/dev. A single write lock is held for the whole of
/// `apply`, which gives the same all-or-nothing visibility as a transaction.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    rows: RwLock<BTreeMap<(SellerId, OfferId), CatalogEntry>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn existing_offer_ids(&self, seller_id: SellerId) -> Result<Vec<OfferId>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::QueryExecFailed)?;
        Ok(rows
            .range((seller_id, OfferId::new(0))..=(seller_id, OfferId::new(u64::MAX)))
            .map(|((_, offer_id), _)| *offer_id)
            .collect())
    }

    async fn apply(&self, seller_id: SellerId, sets: &ReconciliationSets) -> Result<u64, StoreError> {
        if sets.is_empty() {
            return Err(StoreError::EmptyRequest);
        }

        let mut rows = self.rows.write().map_err(|_| StoreError::TxFailed)?;

        for record in sets.upserts() {
            rows.insert((seller_id, record.offer_id), record.clone().into_entry(seller_id));
        }

        let mut deleted = 0u64;
        for offer_id in sets.delete_ids() {
            if rows.remove(&(seller_id, offer_id)).is_some() {
                deleted += 1;
            }
        }
        if deleted != sets.to_delete.len() as u64 {
            warn!(
                seller_id = %seller_id,
                requested = sets.to_delete.len(),
                deleted,
                "mismatched count of products to delete and affected rows"
            );
        }

        Ok(deleted)
    }

    async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::QueryExecFailed)?;
        Ok(rows
            .values()
            .filter(|entry| filter.matches(entry))
            .take(DEFAULT_LIMIT)
            .cloned()
            .collect())
    }
}
