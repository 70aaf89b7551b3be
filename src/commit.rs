//! Commit coordinator: flushes a [`ReconciliationBatch`] to the store.
//!
//! Every sub-operation (one bulk insert, one update per extension, one
//! upsert per metadata document, one insert-if-absent per seed) is issued
//! independently, up to a configured parallelism. A failing sub-operation
//! contributes no counters and is recorded in the result; the rest of the
//! batch still commits.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;

use crate::batch::ReconciliationBatch;
use crate::persistence::PriceStore;

/// Aggregated outcome of committing one store's batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ReconciliationResult {
    /// Store the batch belonged to.
    pub store: String,
    /// Intervals inserted (new keys and rollovers).
    pub intervals_created: u64,
    /// Of the inserted intervals, how many superseded a previous one.
    pub rollovers: u64,
    /// Extension updates that matched an interval.
    pub intervals_matched: u64,
    /// Extension updates that changed an interval's `end`.
    pub intervals_extended: u64,
    /// Metadata rows that already existed.
    pub metadata_matched: u64,
    /// Existing metadata rows whose content changed.
    pub metadata_modified: u64,
    /// Metadata rows inserted by an upsert.
    pub metadata_upserted: u64,
    /// Empty metadata rows inserted for previously unknown products.
    pub metadata_seeded: u64,
    /// Records rejected by the normalizer.
    pub skipped_snapshots: u64,
    /// Observations ignored because their key was already decided.
    pub duplicate_observations: u64,
    /// Sub-operations that failed.
    pub failed_operations: u64,
    /// One message per failed sub-operation.
    pub errors: Vec<String>,
}

impl ReconciliationResult {
    /// `true` when at least one sub-operation failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.failed_operations > 0
    }

    fn record_failure(&mut self, operation: &str, error: impl std::fmt::Display) {
        tracing::warn!(
            store = %self.store,
            operation,
            error = %error,
            "commit sub-operation failed"
        );
        self.failed_operations += 1;
        self.errors.push(format!("{operation}: {error}"));
    }
}

/// Writes batches to a [`PriceStore`] with bounded concurrency.
#[derive(Debug, Clone)]
pub struct CommitCoordinator {
    store: Arc<dyn PriceStore>,
    parallelism: usize,
}

impl CommitCoordinator {
    /// Creates a coordinator issuing at most `parallelism` operations at once.
    #[must_use]
    pub fn new(store: Arc<dyn PriceStore>, parallelism: usize) -> Self {
        Self {
            store,
            parallelism: parallelism.max(1),
        }
    }

    /// Commits `batch`, consuming it.
    ///
    /// Never fails as a whole: per-operation failures are reported through
    /// [`ReconciliationResult::failed_operations`] and
    /// [`ReconciliationResult::errors`].
    pub async fn commit(&self, batch: ReconciliationBatch) -> ReconciliationResult {
        let ReconciliationBatch {
            store,
            new_intervals,
            extensions,
            metadata,
            metadata_seeds,
            stats,
        } = batch;

        let mut result = ReconciliationResult {
            store,
            skipped_snapshots: stats.skipped_snapshots,
            duplicate_observations: stats.duplicate_observations,
            ..ReconciliationResult::default()
        };

        if !new_intervals.is_empty() {
            let staged = new_intervals.len();
            match self.store.insert_many(new_intervals).await {
                Ok(inserted) => {
                    result.intervals_created = inserted;
                    result.rollovers = stats.rollovers;
                }
                Err(e) => result.record_failure(&format!("insert {staged} intervals"), e),
            }
        }

        let store = &self.store;

        let updates: Vec<_> = stream::iter(extensions)
            .map(|ext| async move {
                let outcome = store.update_end(ext.id, ext.end).await;
                (ext, outcome)
            })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;
        for (ext, outcome) in updates {
            match outcome {
                Ok(outcome) => {
                    result.intervals_matched += outcome.matched;
                    result.intervals_extended += outcome.modified;
                    if outcome.matched == 0 {
                        tracing::warn!(
                            interval = %ext.id,
                            key = %ext.key,
                            "extension matched no interval"
                        );
                    }
                }
                Err(e) => {
                    result.record_failure(&format!("extend interval {} ({})", ext.id, ext.key), e);
                }
            }
        }

        let upserts: Vec<_> = stream::iter(metadata)
            .map(|doc| async move {
                let sku = doc.sku.clone();
                (sku, store.upsert_metadata(doc).await)
            })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;
        for (sku, outcome) in upserts {
            match outcome {
                Ok(outcome) => {
                    result.metadata_matched += outcome.matched;
                    result.metadata_modified += outcome.modified;
                    result.metadata_upserted += outcome.upserted;
                }
                Err(e) => result.record_failure(&format!("upsert metadata {sku}"), e),
            }
        }

        let seeds: Vec<_> = stream::iter(metadata_seeds)
            .map(|(seed_store, sku)| async move {
                let outcome = store.seed_metadata(&seed_store, &sku).await;
                (sku, outcome)
            })
            .buffer_unordered(self.parallelism)
            .collect()
            .await;
        for (sku, outcome) in seeds {
            match outcome {
                Ok(true) => result.metadata_seeded += 1,
                Ok(false) => {}
                Err(e) => result.record_failure(&format!("seed metadata {sku}"), e),
            }
        }

        result
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::batch::BatchAccumulator;
    use crate::domain::{IntervalKey, NewInterval, PriceKind, ProductMetadata};
    use crate::ledger::Decision;
    use crate::persistence::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    #[tokio::test]
    async fn commits_inserts_extensions_and_metadata() {
        let memory = Arc::new(MemoryStore::new());
        let coordinator = CommitCoordinator::new(Arc::clone(&memory) as Arc<dyn PriceStore>, 2);
        let key = IntervalKey::new("acme", "A", PriceKind::Regular);

        let mut acc = BatchAccumulator::new("acme");
        acc.stage(Decision::CreateInterval(NewInterval::point(
            key.clone(),
            Decimal::from(100),
            ts(1000),
        )));
        acc.upsert_metadata(ProductMetadata::placeholder("acme", "A"));
        let first = coordinator.commit(acc.finish()).await;
        assert_eq!(first.intervals_created, 1);
        assert_eq!(first.metadata_upserted, 1);
        assert!(!first.is_partial());

        let Ok(Some(current)) = memory.find_latest_by_end(&key).await else {
            panic!("interval should be stored");
        };
        let mut acc = BatchAccumulator::new("acme");
        acc.stage(Decision::ExtendInterval {
            interval: current,
            new_end: ts(2000),
        });
        acc.upsert_metadata(ProductMetadata::placeholder("acme", "A"));
        let second = coordinator.commit(acc.finish()).await;
        assert_eq!(second.intervals_created, 0);
        assert_eq!(second.intervals_matched, 1);
        assert_eq!(second.intervals_extended, 1);
        assert_eq!(second.metadata_matched, 1);
        assert_eq!(second.metadata_modified, 0);
    }

    #[tokio::test]
    async fn empty_batch_commits_nothing() {
        let coordinator = CommitCoordinator::new(Arc::new(MemoryStore::new()), 4);
        let result = coordinator.commit(BatchAccumulator::new("acme").finish()).await;
        assert_eq!(
            result,
            ReconciliationResult {
                store: "acme".into(),
                ..ReconciliationResult::default()
            }
        );
    }
}
