//! Postgres-backed catalog store.
//!
//! ## Error Mapping
//!
//! | Failure | StoreError |
//! |---------|------------|
//! | id/price/quantity does not fit `BIGINT` | `QueryBuildFailed` |
//! | `BEGIN` / `COMMIT` failed | `TxFailed` |
//! | statement failed, or a stored row is malformed | `QueryExecFailed` |
//! | operation deadline elapsed | `TimedOut` |
//!
//! The sqlx error is logged at the call site and not carried upward. A
//! transaction abandoned by an error or a timeout is dropped, which rolls it back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{error, field, instrument, warn, Span};

use offerbook_core::{OfferId, SellerId};
use offerbook_products::{CatalogEntry, ProductRecord, ReconciliationSets};

use super::r#trait::{CatalogStore, ProductFilter, StoreError, DEFAULT_LIMIT};
use crate::config::Config;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    seller_id BIGINT NOT NULL CHECK (seller_id >= 0),
    offer_id  BIGINT NOT NULL CHECK (offer_id >= 0),
    name      VARCHAR(100) NOT NULL,
    price     BIGINT NOT NULL CHECK (price >= 0),
    quantity  BIGINT NOT NULL CHECK (quantity >= 0),
    PRIMARY KEY (seller_id, offer_id)
)
"#;

/// Seller catalogs in a single `products` table keyed by `(seller_id, offer_id)`.
///
/// Every statement is scoped by `seller_id` except the filtered read, whose
/// seller constraint comes from the filter.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool, write_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            write_timeout,
            read_timeout,
        }
    }

    /// Open a pool against `config.database_url`.
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| sqlx::Error::Configuration("DATABASE_URL is not set".into()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.store_timeout)
            .connect(url)
            .await?;
        Ok(Self::new(pool, config.store_timeout, config.query_timeout))
    }

    /// Create the `products` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(&*self.pool).await?;
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(seller_id = %seller_id, operation = field::Empty, offer_count = field::Empty),
        err
    )]
    pub async fn existing_offer_ids(&self, seller_id: SellerId) -> Result<Vec<OfferId>, StoreError> {
        let span = Span::current();
        span.record("operation", "existing_offer_ids");
        let seller = to_bigint(seller_id.get())?;

        let rows = with_deadline(
            self.write_timeout,
            sqlx::query("SELECT offer_id FROM products WHERE seller_id = $1 ORDER BY offer_id")
                .bind(seller)
                .fetch_all(&*self.pool),
        )
        .await?
        .map_err(|e| map_sqlx_error("existing_offer_ids", e, StoreError::QueryExecFailed))?;

        let ids = rows
            .iter()
            .map(|row| {
                let raw: i64 = row
                    .try_get("offer_id")
                    .map_err(|e| map_sqlx_error("existing_offer_ids", e, StoreError::QueryExecFailed))?;
                from_bigint(raw).map(OfferId::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        span.record("offer_count", ids.len());
        Ok(ids)
    }

    /// Upsert adds and updates, then delete, in one transaction.
    #[instrument(
        skip(self, sets),
        fields(
            seller_id = %seller_id,
            to_add = sets.to_add.len(),
            to_update = sets.to_update.len(),
            to_delete = sets.to_delete.len(),
            operation = field::Empty
        ),
        err
    )]
    pub async fn apply(&self, seller_id: SellerId, sets: &ReconciliationSets) -> Result<u64, StoreError> {
        if sets.is_empty() {
            return Err(StoreError::EmptyRequest);
        }
        Span::current().record("operation", "apply");

        let seller = to_bigint(seller_id.get())?;
        let upserts = UpsertColumns::build(sets.upserts())?;
        let deletes = sets
            .delete_ids()
            .into_iter()
            .map(|id| to_bigint(id.get()))
            .collect::<Result<Vec<_>, _>>()?;

        with_deadline(self.write_timeout, self.apply_in_tx(seller, upserts, deletes)).await?
    }

    async fn apply_in_tx(&self, seller: i64, upserts: UpsertColumns, deletes: Vec<i64>) -> Result<u64, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e, StoreError::TxFailed))?;

        if !upserts.is_empty() {
            let expected = upserts.len() as u64;
            let affected = sqlx::query(
                r#"
                INSERT INTO products (seller_id, offer_id, name, price, quantity)
                SELECT $1, t.offer_id, t.name, t.price, t.quantity
                FROM UNNEST($2::BIGINT[], $3::TEXT[], $4::BIGINT[], $5::BIGINT[])
                    AS t(offer_id, name, price, quantity)
                ON CONFLICT (seller_id, offer_id) DO UPDATE
                SET name = EXCLUDED.name,
                    price = EXCLUDED.price,
                    quantity = EXCLUDED.quantity
                "#,
            )
            .bind(seller)
            .bind(&upserts.offer_ids)
            .bind(&upserts.names)
            .bind(&upserts.prices)
            .bind(&upserts.quantities)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_products", e, StoreError::QueryExecFailed))?
            .rows_affected();

            if affected != expected {
                warn!(expected, affected, "mismatched count of products to upsert and affected rows");
            }
        }

        let mut deleted = 0;
        if !deletes.is_empty() {
            deleted = sqlx::query("DELETE FROM products WHERE seller_id = $1 AND offer_id = ANY($2)")
                .bind(seller)
                .bind(&deletes)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_products", e, StoreError::QueryExecFailed))?
                .rows_affected();

            if deleted != deletes.len() as u64 {
                warn!(
                    requested = deletes.len(),
                    deleted,
                    "mismatched count of products to delete and affected rows"
                );
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e, StoreError::TxFailed))?;

        Ok(deleted)
    }

    #[instrument(
        skip(self),
        fields(operation = field::Empty, row_count = field::Empty),
        err
    )]
    pub async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, StoreError> {
        let span = Span::current();
        span.record("operation", "products_by_filter");

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT seller_id, offer_id, name, price, quantity FROM products WHERE TRUE",
        );
        if !filter.seller_ids.is_empty() {
            let ids = filter
                .seller_ids
                .iter()
                .map(|id| to_bigint(id.get()))
                .collect::<Result<Vec<_>, _>>()?;
            qb.push(" AND seller_id = ANY(").push_bind(ids).push(")");
        }
        if !filter.offer_ids.is_empty() {
            let ids = filter
                .offer_ids
                .iter()
                .map(|id| to_bigint(id.get()))
                .collect::<Result<Vec<_>, _>>()?;
            qb.push(" AND offer_id = ANY(").push_bind(ids).push(")");
        }
        if let Some(substring) = filter.substring() {
            qb.push(" AND strpos(name, ").push_bind(substring.to_string()).push(") > 0");
        }
        qb.push(" ORDER BY seller_id, offer_id LIMIT ")
            .push_bind(DEFAULT_LIMIT as i64);

        let rows: Vec<CatalogRow> = with_deadline(
            self.read_timeout,
            qb.build_query_as::<CatalogRow>().fetch_all(&*self.pool),
        )
        .await?
        .map_err(|e| map_sqlx_error("products_by_filter", e, StoreError::QueryExecFailed))?;

        let entries = rows
            .into_iter()
            .map(CatalogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        span.record("row_count", entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn existing_offer_ids(&self, seller_id: SellerId) -> Result<Vec<OfferId>, StoreError> {
        PostgresCatalogStore::existing_offer_ids(self, seller_id).await
    }

    async fn apply(&self, seller_id: SellerId, sets: &ReconciliationSets) -> Result<u64, StoreError> {
        PostgresCatalogStore::apply(self, seller_id, sets).await
    }

    async fn products_by_filter(&self, filter: &ProductFilter) -> Result<Vec<CatalogEntry>, StoreError> {
        PostgresCatalogStore::products_by_filter(self, filter).await
    }
}

/// Column-wise upsert payload for the `UNNEST` insert.
#[derive(Debug, Default)]
struct UpsertColumns {
    offer_ids: Vec<i64>,
    names: Vec<String>,
    prices: Vec<i64>,
    quantities: Vec<i64>,
}

impl UpsertColumns {
    fn build<'a>(records: impl Iterator<Item = &'a ProductRecord>) -> Result<Self, StoreError> {
        let mut cols = Self::default();
        for record in records {
            cols.offer_ids.push(to_bigint(record.offer_id.get())?);
            cols.names.push(record.name.clone());
            cols.prices.push(to_bigint(record.price)?);
            cols.quantities.push(to_bigint(record.quantity)?);
        }
        Ok(cols)
    }

    fn len(&self) -> usize {
        self.offer_ids.len()
    }

    fn is_empty(&self) -> bool {
        self.offer_ids.is_empty()
    }
}

#[derive(Debug)]
struct CatalogRow {
    seller_id: i64,
    offer_id: i64,
    name: String,
    price: i64,
    quantity: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CatalogRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CatalogRow {
            seller_id: row.try_get("seller_id")?,
            offer_id: row.try_get("offer_id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

impl TryFrom<CatalogRow> for CatalogEntry {
    type Error = StoreError;

    fn try_from(row: CatalogRow) -> Result<Self, Self::Error> {
        Ok(CatalogEntry {
            seller_id: SellerId::new(from_bigint(row.seller_id)?),
            offer_id: OfferId::new(from_bigint(row.offer_id)?),
            name: row.name,
            price: from_bigint(row.price)?,
            quantity: from_bigint(row.quantity)?,
        })
    }
}

fn to_bigint(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| {
        error!(value, "value does not fit BIGINT");
        StoreError::QueryBuildFailed
    })
}

fn from_bigint(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| {
        error!(value, "negative value in products table");
        StoreError::QueryExecFailed
    })
}

async fn with_deadline<T>(limit: Duration, fut: impl Future<Output = T>) -> Result<T, StoreError> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!(timeout_ms = limit.as_millis() as u64, "storage operation timed out");
        StoreError::TimedOut
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error, kind: StoreError) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => error!(
            operation,
            code = db_err.code().as_deref().unwrap_or(""),
            message = db_err.message(),
            "database error"
        ),
        other => error!(operation, error = %other, "sqlx error"),
    }
    kind
}
