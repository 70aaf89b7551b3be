//! Persistence layer: price intervals and product metadata.
//!
//! [`PriceStore`] is the storage contract the reconciliation core relies
//! on. Each operation is atomic on its own; no transaction spans several
//! operations. [`PostgresStore`] is the production backend and
//! [`MemoryStore`] keeps everything in process.

pub mod memory;
pub mod models;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use models::{UpdateOutcome, UpsertOutcome};
pub use postgres::PostgresStore;

use crate::config::AppConfig;
use crate::domain::{IntervalId, IntervalKey, NewInterval, PriceInterval, ProductMetadata};
use crate::error::PersistenceError;

/// Storage contract for intervals and metadata.
#[async_trait]
pub trait PriceStore: Send + Sync + std::fmt::Debug {
    /// The interval of `key` with the greatest `end`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn find_latest_by_end(
        &self,
        key: &IntervalKey,
    ) -> Result<Option<PriceInterval>, PersistenceError>;

    /// The current interval of every key of `store`, in one read.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn current_intervals(&self, store: &str) -> Result<Vec<PriceInterval>, PersistenceError>;

    /// Inserts all `intervals` atomically. Returns the number inserted.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn insert_many(&self, intervals: Vec<NewInterval>) -> Result<u64, PersistenceError>;

    /// Sets the `end` of interval `id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn update_end(
        &self,
        id: IntervalId,
        end: DateTime<Utc>,
    ) -> Result<UpdateOutcome, PersistenceError>;

    /// Replaces the metadata row of `(store, sku)`, inserting it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn upsert_metadata(
        &self,
        metadata: ProductMetadata,
    ) -> Result<UpsertOutcome, PersistenceError>;

    /// Inserts an empty metadata row unless one exists. Returns `true`
    /// when a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn seed_metadata(&self, store: &str, sku: &str) -> Result<bool, PersistenceError>;

    /// Full interval history of a product, ordered by kind then `start`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn intervals_for(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Vec<PriceInterval>, PersistenceError>;

    /// Metadata row of a product.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    async fn metadata(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Option<ProductMetadata>, PersistenceError>;
}

/// Opens the configured backend: PostgreSQL (migrated on connect) or,
/// with `PERSISTENCE_ENABLED=false`, an empty [`MemoryStore`].
///
/// # Errors
///
/// Returns [`PersistenceError`] if the database is unreachable or a
/// migration fails.
pub async fn open(config: &AppConfig) -> Result<Arc<dyn PriceStore>, PersistenceError> {
    if config.persistence_enabled {
        Ok(Arc::new(PostgresStore::connect(config).await?))
    } else {
        tracing::warn!("persistence disabled, intervals are kept in memory only");
        Ok(Arc::new(MemoryStore::new()))
    }
}
