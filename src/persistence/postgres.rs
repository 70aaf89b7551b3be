//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::PriceStore;
use super::models::{
    IntervalRow, MetadataRow, UpdateOutcome, UpsertOutcome, interval_from_row,
};
use crate::config::AppConfig;
use crate::domain::{IntervalId, IntervalKey, NewInterval, PriceInterval, ProductMetadata};
use crate::error::PersistenceError;

/// Rows per multi-row `INSERT`, keeping binds under the protocol limit.
const INSERT_CHUNK: usize = 5_000;

const INTERVAL_COLUMNS: &str = "id, store, sku, price_kind, price, start_at, end_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the configured pool settings and applies pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the database is unreachable or a
    /// migration fails.
    pub async fn connect(config: &AppConfig) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl PriceStore for PostgresStore {
    async fn find_latest_by_end(
        &self,
        key: &IntervalKey,
    ) -> Result<Option<PriceInterval>, PersistenceError> {
        let row = sqlx::query_as::<_, IntervalRow>(&format!(
            "SELECT {INTERVAL_COLUMNS} FROM price_intervals \
             WHERE store = $1 AND sku = $2 AND price_kind = $3 \
             ORDER BY end_at DESC LIMIT 1"
        ))
        .bind(&key.store)
        .bind(&key.sku)
        .bind(key.kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(interval_from_row).transpose()
    }

    async fn current_intervals(&self, store: &str) -> Result<Vec<PriceInterval>, PersistenceError> {
        let rows = sqlx::query_as::<_, IntervalRow>(&format!(
            "SELECT DISTINCT ON (sku, price_kind) {INTERVAL_COLUMNS} FROM price_intervals \
             WHERE store = $1 ORDER BY sku, price_kind, end_at DESC"
        ))
        .bind(store)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(interval_from_row).collect()
    }

    async fn insert_many(&self, intervals: Vec<NewInterval>) -> Result<u64, PersistenceError> {
        if intervals.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for chunk in intervals.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO price_intervals (store, sku, price_kind, price, start_at, end_at) ",
            );
            builder.push_values(chunk, |mut row, interval| {
                row.push_bind(&interval.key.store)
                    .push_bind(&interval.key.sku)
                    .push_bind(interval.key.kind.as_str())
                    .push_bind(interval.price)
                    .push_bind(interval.start)
                    .push_bind(interval.end);
            });
            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn update_end(
        &self,
        id: IntervalId,
        end: DateTime<Utc>,
    ) -> Result<UpdateOutcome, PersistenceError> {
        let (matched, modified) = sqlx::query_as::<_, (i64, i64)>(
            "WITH target AS (SELECT id, end_at FROM price_intervals WHERE id = $1), \
             updated AS ( \
                 UPDATE price_intervals p SET end_at = $2 FROM target t \
                 WHERE p.id = t.id AND t.end_at IS DISTINCT FROM $2 RETURNING p.id) \
             SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM updated)",
        )
        .bind(id.get())
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(UpdateOutcome {
            matched: u64::try_from(matched).unwrap_or_default(),
            modified: u64::try_from(modified).unwrap_or_default(),
        })
    }

    async fn upsert_metadata(
        &self,
        metadata: ProductMetadata,
    ) -> Result<UpsertOutcome, PersistenceError> {
        let (existing, written) = sqlx::query_as::<_, (i64, i64)>(
            "WITH existing AS (SELECT 1 FROM product_metadata WHERE store = $1 AND sku = $2), \
             written AS ( \
                 INSERT INTO product_metadata (store, sku, name, brand, ean) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (store, sku) DO UPDATE \
                 SET name = EXCLUDED.name, brand = EXCLUDED.brand, ean = EXCLUDED.ean, \
                     updated_at = now() \
                 WHERE (product_metadata.name, product_metadata.brand, product_metadata.ean) \
                       IS DISTINCT FROM (EXCLUDED.name, EXCLUDED.brand, EXCLUDED.ean) \
                 RETURNING 1) \
             SELECT (SELECT COUNT(*) FROM existing), (SELECT COUNT(*) FROM written)",
        )
        .bind(&metadata.store)
        .bind(&metadata.sku)
        .bind(&metadata.name)
        .bind(&metadata.brand)
        .bind(&metadata.ean)
        .fetch_one(&self.pool)
        .await?;

        let written = u64::try_from(written).unwrap_or_default();
        Ok(if existing > 0 {
            UpsertOutcome {
                matched: 1,
                modified: written,
                upserted: 0,
            }
        } else {
            UpsertOutcome {
                matched: 0,
                modified: 0,
                upserted: written,
            }
        })
    }

    async fn seed_metadata(&self, store: &str, sku: &str) -> Result<bool, PersistenceError> {
        let result = sqlx::query(
            "INSERT INTO product_metadata (store, sku) VALUES ($1, $2) \
             ON CONFLICT (store, sku) DO NOTHING",
        )
        .bind(store)
        .bind(sku)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn intervals_for(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Vec<PriceInterval>, PersistenceError> {
        let rows = sqlx::query_as::<_, IntervalRow>(&format!(
            "SELECT {INTERVAL_COLUMNS} FROM price_intervals \
             WHERE store = $1 AND sku = $2 ORDER BY price_kind, start_at"
        ))
        .bind(store)
        .bind(sku)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(interval_from_row).collect()
    }

    async fn metadata(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Option<ProductMetadata>, PersistenceError> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT store, sku, name, brand, ean FROM product_metadata \
             WHERE store = $1 AND sku = $2",
        )
        .bind(store)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(store, sku, name, brand, ean)| ProductMetadata {
            store,
            sku,
            name,
            brand,
            ean,
        }))
    }
}
