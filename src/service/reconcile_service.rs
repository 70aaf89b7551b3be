//! Reconcile service: runs the ingestion pipeline and answers price queries.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::batch::BatchAccumulator;
use crate::commit::{CommitCoordinator, ReconciliationResult};
use crate::config::AppConfig;
use crate::domain::{PriceInterval, PriceKind, ProductMetadata, RunId, interval_at};
use crate::error::ServiceError;
use crate::ledger::{IntervalLedger, RolloverPolicy};
use crate::normalizer::{RawProduct, normalize};
use crate::persistence::PriceStore;
use crate::registry::{StoreConfig, StoreRegistry};
use crate::source::SnapshotSource;

/// Tunables of a reconciliation run.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// How long an interval stays fresh after its last confirmation.
    pub staleness_window: chrono::Duration,
    /// Whether fresh intervals absorb price differences.
    pub policy: RolloverPolicy,
    /// Concurrent commit sub-operations per store.
    pub commit_parallelism: usize,
    /// Stores reconciled concurrently.
    pub store_parallelism: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            staleness_window: chrono::Duration::hours(48),
            policy: RolloverPolicy::Debounce,
            commit_parallelism: 4,
            store_parallelism: 4,
        }
    }
}

impl From<&AppConfig> for ReconcileOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            staleness_window: config.staleness_window(),
            policy: config.rollover_policy,
            commit_parallelism: config.commit_parallelism,
            store_parallelism: config.store_parallelism,
        }
    }
}

/// How one store's part of a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreOutcome {
    /// The batch was committed, possibly with failed sub-operations.
    Completed(ReconciliationResult),
    /// The store was abandoned before commit.
    Failed {
        /// Why the store failed.
        error: String,
    },
}

/// Outcome of one "reconcile all stores" run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Run identifier, also present on every log line of the run.
    pub run_id: RunId,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last store finished.
    pub finished_at: DateTime<Utc>,
    /// Outcome per store name.
    pub stores: BTreeMap<String, StoreOutcome>,
}

impl RunSummary {
    /// Number of stores that failed outright.
    #[must_use]
    pub fn failed_stores(&self) -> usize {
        self.stores
            .values()
            .filter(|o| matches!(o, StoreOutcome::Failed { .. }))
            .count()
    }
}

/// Intervals in effect for one product at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceAt {
    /// Queried instant.
    pub at: DateTime<Utc>,
    /// Regular-price interval containing `at`.
    pub regular: Option<PriceInterval>,
    /// Sale-price interval containing `at`.
    pub sale: Option<PriceInterval>,
}

/// Full recorded history of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductHistory {
    /// Latest descriptive attributes, if known.
    pub metadata: Option<ProductMetadata>,
    /// Every interval, ordered by kind then start.
    pub intervals: Vec<PriceInterval>,
}

/// Orchestrates reconciliation runs over the registry's stores.
///
/// A single run may be in flight at a time; stores within a run are
/// independent and reconciled concurrently.
#[derive(Debug)]
pub struct ReconcileService {
    store: Arc<dyn PriceStore>,
    source: Arc<dyn SnapshotSource>,
    registry: Arc<StoreRegistry>,
    coordinator: CommitCoordinator,
    options: ReconcileOptions,
    run_lock: Mutex<()>,
}

impl ReconcileService {
    /// Creates a new `ReconcileService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn PriceStore>,
        source: Arc<dyn SnapshotSource>,
        registry: Arc<StoreRegistry>,
        options: ReconcileOptions,
    ) -> Self {
        let coordinator = CommitCoordinator::new(Arc::clone(&store), options.commit_parallelism);
        Self {
            store,
            source,
            registry,
            coordinator,
            options,
            run_lock: Mutex::new(()),
        }
    }

    /// Returns the store registry.
    #[must_use]
    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Reconciles every enabled store once.
    ///
    /// Per-store failures are reported in the summary, never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::RunInProgress`] if another run holds the lock.
    pub async fn reconcile_all(&self) -> Result<RunSummary, ServiceError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(ServiceError::RunInProgress);
        };

        let run_id = RunId::new();
        let started_at = Utc::now();
        tracing::info!(
            %run_id,
            stores = self.registry.enabled().count(),
            "reconciliation run started"
        );

        let enabled: Vec<StoreConfig> = self.registry.enabled().cloned().collect();
        let stores: BTreeMap<String, StoreOutcome> = stream::iter(enabled)
            .map(|store| async move {
                let outcome = self.run_store(&store).await;
                (store.name, outcome)
            })
            .buffer_unordered(self.options.store_parallelism.max(1))
            .collect()
            .await;

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stores,
        };
        tracing::info!(
            %run_id,
            stores = summary.stores.len(),
            failed = summary.failed_stores(),
            "reconciliation run finished"
        );
        Ok(summary)
    }

    /// Fetches, reconciles and commits one store.
    pub async fn run_store(&self, store: &StoreConfig) -> StoreOutcome {
        let raw = match self.source.fetch_products(store).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(
                    store = %store.name,
                    source = store.source.label(),
                    error = %e,
                    "source failed, store skipped"
                );
                return StoreOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match self.reconcile_products(&store.name, &raw, Utc::now()).await {
            Ok(result) => StoreOutcome::Completed(result),
            Err(e) => {
                tracing::error!(store = %store.name, error = %e, "reconciliation failed");
                StoreOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Reconciles one store's raw records observed at `now` and commits
    /// the resulting batch.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] if the current intervals of
    /// the store cannot be loaded. Commit failures are reported inside the
    /// returned result instead.
    pub async fn reconcile_products(
        &self,
        store: &str,
        raw: &[RawProduct],
        now: DateTime<Utc>,
    ) -> Result<ReconciliationResult, ServiceError> {
        let stale_after = now - self.options.staleness_window;
        let current = self.store.current_intervals(store).await?;
        let mut ledger = IntervalLedger::from_current(current, self.options.policy);
        let mut acc = BatchAccumulator::new(store);
        let mut seen: HashSet<String> = HashSet::new();

        for record in raw {
            let snapshot = match normalize(store, record) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(store, error = %e, "skipping invalid snapshot");
                    acc.record_skipped();
                    continue;
                }
            };

            // A repeated SKU is ignored whole: prices and metadata both come
            // from its first record.
            if !seen.insert(snapshot.sku.clone()) {
                for (kind, _) in snapshot.observations() {
                    tracing::warn!(
                        store,
                        sku = %snapshot.sku,
                        price_kind = %kind,
                        "duplicate observation ignored"
                    );
                    acc.record_duplicate();
                }
                continue;
            }

            for (kind, price) in snapshot.observations() {
                match ledger.reconcile(snapshot.key(kind), price, now, stale_after) {
                    Some(decision) => {
                        tracing::trace!(
                            store,
                            sku = %snapshot.sku,
                            price_kind = %kind,
                            decision = decision.label(),
                            "decided"
                        );
                        acc.stage(decision);
                    }
                    None => {
                        tracing::warn!(
                            store,
                            sku = %snapshot.sku,
                            price_kind = %kind,
                            "duplicate observation ignored"
                        );
                        acc.record_duplicate();
                    }
                }
            }
            acc.upsert_metadata(snapshot.metadata());
        }

        let batch = acc.finish();
        let result = self.coordinator.commit(batch).await;
        if result.is_partial() {
            tracing::warn!(store, failed = result.failed_operations, "store committed partially");
        } else {
            tracing::info!(
                store,
                created = result.intervals_created,
                rollovers = result.rollovers,
                extended = result.intervals_extended,
                metadata_upserted = result.metadata_upserted,
                skipped = result.skipped_snapshots,
                "store reconciled"
            );
        }
        Ok(result)
    }

    /// The regular and sale intervals of a product in effect at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::StoreNotFound`] for an unknown store and
    /// [`ServiceError::Persistence`] if the history cannot be read.
    pub async fn price_at(
        &self,
        store: &str,
        sku: &str,
        at: DateTime<Utc>,
    ) -> Result<PriceAt, ServiceError> {
        self.require_store(store)?;
        let intervals = self.store.intervals_for(store, sku).await?;
        Ok(PriceAt {
            at,
            regular: interval_at(&intervals, PriceKind::Regular, at).cloned(),
            sale: interval_at(&intervals, PriceKind::Sale, at).cloned(),
        })
    }

    /// Every interval and the metadata of a product.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::StoreNotFound`] for an unknown store and
    /// [`ServiceError::Persistence`] if the history cannot be read.
    pub async fn history(&self, store: &str, sku: &str) -> Result<ProductHistory, ServiceError> {
        self.require_store(store)?;
        let intervals = self.store.intervals_for(store, sku).await?;
        let metadata = self.store.metadata(store, sku).await?;
        Ok(ProductHistory {
            metadata,
            intervals,
        })
    }

    fn require_store(&self, store: &str) -> Result<(), ServiceError> {
        self.registry
            .get(store)
            .map(|_| ())
            .ok_or_else(|| ServiceError::StoreNotFound(store.to_string()))
    }
}
