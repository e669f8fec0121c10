//! Catalog update orchestration.
//!
//! ```text
//! bytes ──parse──▶ candidates ──reconcile(existing ids)──▶ add/update/delete ──apply──▶ report
//! ```
//!
//! `CatalogService` owns no IO of its own: it composes the [`CatalogStore`]
//! seam with the stateless parser and reconciler, so it runs unchanged against
//! the in-memory store in tests and Postgres in production.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use offerbook_core::{Classify, ErrorKind, SellerId};
use offerbook_ingest::{ParseError, TabularParser};
use offerbook_products::{reconcile, CandidateUpdate, CatalogEntry, RowError};

use crate::catalog_store::{CatalogStore, ProductFilter, StoreError};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CatalogError {
    /// The request carried no candidates at all.
    #[error("empty request")]
    EmptyRequest,

    /// The same offer id appears more than once in one request.
    #[error("request contains offer_id duplicates")]
    HasDuplicates,

    /// Decoding the table did not finish within the configured deadline.
    #[error("table decoding timed out")]
    DecodeTimedOut,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for CatalogError {
    fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::EmptyRequest => ErrorKind::EmptyRequest,
            CatalogError::HasDuplicates => ErrorKind::Conflict,
            CatalogError::DecodeTimedOut => ErrorKind::BadInput,
            CatalogError::Parse(e) => e.kind(),
            CatalogError::Store(e) => e.kind(),
        }
    }
}

/// Outcome of one catalog update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub added: u64,
    pub updated: u64,
    /// Rows actually removed, which may be fewer than requested.
    pub deleted: u64,
    pub errors: Vec<RowError>,
}

/// Deadline for decoding one table when none is configured.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
    parser: TabularParser,
    decode_timeout: Duration,
}

impl<S> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            parser: TabularParser::new(),
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
        }
    }

    pub fn with_decode_timeout(mut self, decode_timeout: Duration) -> Self {
        self.decode_timeout = decode_timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: CatalogStore> CatalogService<S> {
    /// Reconcile `candidates` against the seller's catalog and persist the result.
    ///
    /// Candidates that fail validation are left out of the write and reported
    /// in `errors`. When nothing valid remains the store is not touched. A
    /// request naming the same offer id twice is refused as a whole.
    #[instrument(skip(self, candidates), fields(seller_id = %seller_id, candidates = candidates.len()), err)]
    pub async fn update_catalog(
        &self,
        seller_id: SellerId,
        candidates: Vec<CandidateUpdate>,
    ) -> Result<UpdateReport, CatalogError> {
        if candidates.is_empty() {
            return Err(CatalogError::EmptyRequest);
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        if !candidates.iter().all(|c| seen.insert(c.offer_id())) {
            warn!("request has offer_id duplicates");
            return Err(CatalogError::HasDuplicates);
        }

        let existing = self.store.existing_offer_ids(seller_id).await?;
        let outcome = reconcile(&existing, candidates);

        let mut report = UpdateReport {
            added: outcome.sets.to_add.len() as u64,
            updated: outcome.sets.to_update.len() as u64,
            deleted: 0,
            errors: outcome.errors,
        };

        if outcome.sets.is_empty() {
            info!(invalid = report.errors.len(), "nothing to persist");
            return Ok(report);
        }

        report.deleted = self.store.apply(seller_id, &outcome.sets).await?;
        info!(
            added = report.added,
            updated = report.updated,
            deleted = report.deleted,
            invalid = report.errors.len(),
            "catalog updated"
        );
        Ok(report)
    }

    /// Parse an xlsx table and apply it to the seller's catalog.
    ///
    /// The reported errors are validation errors followed by row-level parse
    /// errors.
    #[instrument(skip(self, bytes), fields(seller_id = %seller_id, bytes = bytes.len()), err)]
    pub async fn import_table(&self, seller_id: SellerId, bytes: Vec<u8>) -> Result<UpdateReport, CatalogError> {
        let parser = self.parser;
        let parsing = tokio::task::spawn_blocking(move || parser.parse(&bytes));
        let sheet = tokio::time::timeout(self.decode_timeout, parsing)
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.decode_timeout.as_millis() as u64, "table decoding timed out");
                CatalogError::DecodeTimedOut
            })?
            .map_err(|e| {
                warn!(error = %e, "table parsing task failed");
                ParseError::FailedToRead
            })??;

        let parse_errors = sheet.row_errors.unwrap_or_default();
        if sheet.candidates.is_empty() {
            info!(invalid = parse_errors.len(), "table has no valid rows");
            return Ok(UpdateReport {
                errors: parse_errors,
                ..UpdateReport::default()
            });
        }

        let mut report = self.update_catalog(seller_id, sheet.candidates).await?;
        report.errors.extend(parse_errors);
        Ok(report)
    }

    pub async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.store.products_by_filter(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::InMemoryCatalogStore;
    use async_trait::async_trait;
    use offerbook_core::OfferId;
    use offerbook_products::{ProductRecord, ReconciliationSets};
    use rust_xlsxwriter::Workbook;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn candidate(offer_id: u64, name: &str, price: u64, available: bool, row: u64) -> CandidateUpdate {
        CandidateUpdate::new(
            ProductRecord {
                offer_id: OfferId::new(offer_id),
                name: name.to_string(),
                price,
                quantity: 1,
            },
            available,
            row,
        )
    }

    fn sheet(rows: &[(f64, &str, f64, f64, bool)]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        for (i, (offer_id, name, price, quantity, available)) in rows.iter().enumerate() {
            let r = i as u32;
            ws.write_number(r, 0, *offer_id).unwrap();
            ws.write_string(r, 1, *name).unwrap();
            ws.write_number(r, 2, *price).unwrap();
            ws.write_number(r, 3, *quantity).unwrap();
            ws.write_boolean(r, 4, *available).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    /// Store that counts writes and can be told to fail them.
    #[derive(Default)]
    struct RecordingStore {
        inner: InMemoryCatalogStore,
        applies: AtomicUsize,
        fail_apply: bool,
    }

    #[async_trait]
    impl CatalogStore for RecordingStore {
        async fn existing_offer_ids(&self, seller_id: SellerId) -> Result<Vec<OfferId>, StoreError> {
            self.inner.existing_offer_ids(seller_id).await
        }

        async fn apply(&self, seller_id: SellerId, sets: &ReconciliationSets) -> Result<u64, StoreError> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            if self.fail_apply {
                return Err(StoreError::TxFailed);
            }
            self.inner.apply(seller_id, sets).await
        }

        async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, StoreError> {
            self.inner.products_by_filter(filter).await
        }
    }

    const SELLER: SellerId = SellerId::new(1);

    #[test]
    fn report_wire_shape() {
        let report = UpdateReport {
            added: 1,
            updated: 2,
            deleted: 0,
            errors: vec![RowError::new(4, "price", "invalid digit found in string")],
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "added": 1,
                "updated": 2,
                "deleted": 0,
                "errors": [{ "row": 4, "field": "price", "errMsg": "invalid digit found in string" }],
            })
        );
    }

    #[tokio::test]
    async fn import_into_empty_catalog_adds() {
        let service = CatalogService::new(InMemoryCatalogStore::new());
        let report = service
            .import_table(SELLER, sheet(&[(1.0, "head", 10.0, 1.0, true)]))
            .await
            .unwrap();

        assert_eq!(
            report,
            UpdateReport {
                added: 1,
                updated: 0,
                deleted: 0,
                errors: vec![],
            }
        );
    }

    #[tokio::test]
    async fn import_of_known_offer_updates_it() {
        let service = CatalogService::new(InMemoryCatalogStore::new());
        service
            .update_catalog(SELLER, vec![candidate(1, "head", 10, true, 1)])
            .await
            .unwrap();

        let report = service
            .import_table(SELLER, sheet(&[(1.0, "head2", 99.0, 1.0, true)]))
            .await
            .unwrap();
        assert_eq!((report.added, report.updated, report.deleted), (0, 1, 0));

        let rows = service.products_by_filter(&ProductFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 99);
        assert_eq!(rows[0].name, "head2");
    }

    #[tokio::test]
    async fn import_with_only_invalid_rows_skips_storage() {
        let service = CatalogService::new(RecordingStore::default());
        let long_name = "x".repeat(101);

        let report = service
            .import_table(SELLER, sheet(&[(1.0, long_name.as_str(), 10.0, 1.0, true)]))
            .await
            .unwrap();

        assert_eq!(
            report,
            UpdateReport {
                errors: vec![RowError::new(1, "name", "too long name")],
                ..UpdateReport::default()
            }
        );
        assert_eq!(service.store().applies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deleting_an_unknown_offer_reports_zero() {
        let service = CatalogService::new(InMemoryCatalogStore::new());
        let report = service
            .import_table(SELLER, sheet(&[(5.0, "gone", 1.0, 1.0, false)]))
            .await
            .unwrap();
        assert_eq!(report, UpdateReport::default());
    }

    #[tokio::test]
    async fn empty_candidate_list_is_rejected() {
        let service = CatalogService::new(InMemoryCatalogStore::new());
        let err = service.update_catalog(SELLER, vec![]).await.unwrap_err();
        assert_eq!(err, CatalogError::EmptyRequest);
        assert_eq!(err.kind(), ErrorKind::EmptyRequest);
    }

    #[tokio::test]
    async fn invalid_candidates_never_reach_the_store() {
        let service = CatalogService::new(RecordingStore::default());
        let report = service
            .update_catalog(SELLER, vec![candidate(1, &"y".repeat(101), 1, true, 3)])
            .await
            .unwrap();

        assert_eq!((report.added, report.updated, report.deleted), (0, 0, 0));
        assert_eq!(report.errors, vec![RowError::new(3, "name", "too long name")]);
        assert_eq!(service.store().applies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn storage_failure_aborts_the_update() {
        let service = CatalogService::new(RecordingStore {
            fail_apply: true,
            ..RecordingStore::default()
        });
        let err = service
            .update_catalog(SELLER, vec![candidate(1, "head", 10, true, 1)])
            .await
            .unwrap_err();

        assert_eq!(err, CatalogError::Store(StoreError::TxFailed));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(service.products_by_filter(&ProductFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mixed_batch_counts_each_set() {
        let service = CatalogService::new(InMemoryCatalogStore::new());
        service
            .update_catalog(
                SELLER,
                vec![candidate(1, "head", 10, true, 1), candidate(2, "body", 20, true, 2)],
            )
            .await
            .unwrap();

        let report = service
            .update_catalog(
                SELLER,
                vec![
                    candidate(1, "head v2", 11, true, 1),
                    candidate(2, "body", 20, false, 2),
                    candidate(3, "tail", 30, true, 3),
                ],
            )
            .await
            .unwrap();
        assert_eq!((report.added, report.updated, report.deleted), (1, 1, 1));
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn parse_errors_are_reported_next_to_valid_rows() {
        let service = CatalogService::new(InMemoryCatalogStore::new());

        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        // row 1: valid
        ws.write_number(0, 0, 1.0).unwrap();
        ws.write_string(0, 1, "head").unwrap();
        ws.write_number(0, 2, 10.0).unwrap();
        ws.write_number(0, 3, 1.0).unwrap();
        ws.write_boolean(0, 4, true).unwrap();
        // row 2: bad price
        ws.write_number(1, 0, 2.0).unwrap();
        ws.write_string(1, 1, "body").unwrap();
        ws.write_string(1, 2, "cheap").unwrap();
        ws.write_number(1, 3, 1.0).unwrap();
        ws.write_boolean(1, 4, true).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let report = service.import_table(SELLER, bytes).await.unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 2);
        assert_eq!(report.errors[0].field, "price");
    }

    #[tokio::test]
    async fn repeated_offer_id_in_one_request_is_a_conflict() {
        let service = CatalogService::new(RecordingStore::default());

        let err = service
            .update_catalog(
                SELLER,
                vec![candidate(7, "a", 1, true, 1), candidate(7, "b", 2, true, 2)],
            )
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::HasDuplicates);
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = service
            .update_catalog(
                SELLER,
                vec![candidate(8, "x", 1, true, 1), candidate(8, "x", 1, false, 2)],
            )
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::HasDuplicates);

        assert_eq!(service.store().applies.load(Ordering::SeqCst), 0);
        assert!(service.products_by_filter(&ProductFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn decode_past_the_deadline_times_out() {
        let service =
            CatalogService::new(RecordingStore::default()).with_decode_timeout(Duration::ZERO);
        let rows: Vec<(f64, &str, f64, f64, bool)> =
            (0..2000).map(|i| (i as f64, "bulk", 1.0, 1.0, true)).collect();

        let err = service.import_table(SELLER, sheet(&rows)).await.unwrap_err();
        assert_eq!(err, CatalogError::DecodeTimedOut);
        assert_eq!(err.kind(), ErrorKind::BadInput);
        assert_eq!(service.store().applies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreadable_table_is_a_parse_error() {
        let service = CatalogService::new(InMemoryCatalogStore::new());
        let err = service
            .import_table(SELLER, b"not a workbook".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::Parse(ParseError::FailedToRead));
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn duplicate_offer_ids_are_a_conflict() {
        let service = CatalogService::new(InMemoryCatalogStore::new());
        let err = service
            .import_table(
                SELLER,
                sheet(&[(1.0, "a", 1.0, 1.0, true), (1.0, "b", 1.0, 1.0, true)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
