//! End-to-end reconciliation against the in-memory store.
//!
//! Drives `ReconcileService` with explicit timestamps and checks the
//! resulting interval history.

#![allow(clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use price_ledger::commit::CommitCoordinator;
use price_ledger::domain::{
    IntervalId, IntervalKey, NewInterval, PriceInterval, PriceKind, ProductMetadata,
};
use price_ledger::error::{PersistenceError, SourceError};
use price_ledger::importer::{HistoricalImporter, ImportError, Observation, OpenEnd};
use price_ledger::ledger::RolloverPolicy;
use price_ledger::normalizer::RawProduct;
use price_ledger::persistence::{MemoryStore, PriceStore, UpdateOutcome, UpsertOutcome};
use price_ledger::registry::{FeedOptions, SourceKind, StoreConfig, StoreRegistry};
use price_ledger::service::{ReconcileOptions, ReconcileService, StoreOutcome};
use price_ledger::source::SnapshotSource;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn raw(sku: &str, price: &str, sale: Option<&str>) -> RawProduct {
    RawProduct {
        id: json!(sku),
        title: json!(format!("Product {sku}")),
        brand: json!("Acme"),
        price: json!(price),
        sale_price: sale.map_or(Value::Null, |s| json!(s)),
        ..RawProduct::default()
    }
}

fn feed_store(name: &str) -> StoreConfig {
    StoreConfig {
        name: name.into(),
        enabled: true,
        source: SourceKind::Feed(FeedOptions {
            feed_url: format!("https://{name}.example/feed.xml"),
        }),
    }
}

/// Serves canned records per store; a store without records fails.
#[derive(Debug, Default)]
struct CannedSource {
    records: RwLock<Vec<(String, Vec<RawProduct>)>>,
}

impl CannedSource {
    async fn set(&self, store: &str, records: Vec<RawProduct>) {
        let mut guard = self.records.write().await;
        guard.retain(|(name, _)| name != store);
        guard.push((store.to_string(), records));
    }
}

#[async_trait]
impl SnapshotSource for CannedSource {
    async fn fetch_products(&self, store: &StoreConfig) -> Result<Vec<RawProduct>, SourceError> {
        self.records
            .read()
            .await
            .iter()
            .find(|(name, _)| *name == store.name)
            .map(|(_, records)| records.clone())
            .ok_or_else(|| SourceError::Parse(format!("no feed for {}", store.name)))
    }
}

/// Delegates to a `MemoryStore` but rejects every `end` update.
#[derive(Debug, Default)]
struct FailingUpdates {
    inner: MemoryStore,
}

#[async_trait]
impl PriceStore for FailingUpdates {
    async fn find_latest_by_end(
        &self,
        key: &IntervalKey,
    ) -> Result<Option<PriceInterval>, PersistenceError> {
        self.inner.find_latest_by_end(key).await
    }

    async fn current_intervals(&self, store: &str) -> Result<Vec<PriceInterval>, PersistenceError> {
        self.inner.current_intervals(store).await
    }

    async fn insert_many(&self, intervals: Vec<NewInterval>) -> Result<u64, PersistenceError> {
        self.inner.insert_many(intervals).await
    }

    async fn update_end(
        &self,
        _id: IntervalId,
        _end: DateTime<Utc>,
    ) -> Result<UpdateOutcome, PersistenceError> {
        Err(PersistenceError::Unavailable("write timeout".into()))
    }

    async fn upsert_metadata(
        &self,
        metadata: ProductMetadata,
    ) -> Result<UpsertOutcome, PersistenceError> {
        self.inner.upsert_metadata(metadata).await
    }

    async fn seed_metadata(&self, store: &str, sku: &str) -> Result<bool, PersistenceError> {
        self.inner.seed_metadata(store, sku).await
    }

    async fn intervals_for(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Vec<PriceInterval>, PersistenceError> {
        self.inner.intervals_for(store, sku).await
    }

    async fn metadata(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Option<ProductMetadata>, PersistenceError> {
        self.inner.metadata(store, sku).await
    }
}

fn service_with(
    store: Arc<dyn PriceStore>,
    source: Arc<CannedSource>,
    window_secs: i64,
    policy: RolloverPolicy,
) -> ReconcileService {
    let Ok(registry) = StoreRegistry::new(vec![feed_store("storeA"), feed_store("storeB")]) else {
        panic!("registry should build");
    };
    ReconcileService::new(
        store,
        source,
        Arc::new(registry),
        ReconcileOptions {
            staleness_window: chrono::Duration::seconds(window_secs),
            policy,
            commit_parallelism: 2,
            store_parallelism: 2,
        },
    )
}

fn service(memory: &Arc<MemoryStore>, window_secs: i64) -> ReconcileService {
    service_with(
        Arc::clone(memory) as Arc<dyn PriceStore>,
        Arc::new(CannedSource::default()),
        window_secs,
        RolloverPolicy::Debounce,
    )
}

async fn regular_history(
    memory: &MemoryStore,
    sku: &str,
) -> Vec<(Decimal, DateTime<Utc>, DateTime<Utc>)> {
    let Ok(intervals) = memory.intervals_for("storeA", sku).await else {
        panic!("history should load");
    };
    intervals
        .into_iter()
        .filter(|i| i.key.kind == PriceKind::Regular)
        .map(|i| (i.price, i.start, i.end))
        .collect()
}

#[tokio::test]
async fn same_price_observations_collapse_into_one_interval() {
    let memory = Arc::new(MemoryStore::new());
    let svc = service(&memory, 500);

    for at in [1000, 2000, 3500, 9000] {
        let Ok(result) = svc
            .reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(at))
            .await
        else {
            panic!("run at {at} should succeed");
        };
        assert!(!result.is_partial());
    }

    assert_eq!(
        regular_history(&memory, "SKU1").await,
        vec![(Decimal::from(100), ts(1000), ts(9000))]
    );
}

#[tokio::test]
async fn fresh_interval_absorbs_a_price_change() {
    let memory = Arc::new(MemoryStore::new());
    // now = 2000, window = 1500 => staleAfter = 500, not after end = 1000.
    let svc = service(&memory, 1500);

    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(1000)).await;
    let Ok(result) = svc
        .reconcile_products("storeA", &[raw("SKU1", "120", None)], ts(2000))
        .await
    else {
        panic!("second run should succeed");
    };

    assert_eq!(result.intervals_created, 0);
    assert_eq!(result.intervals_extended, 1);
    assert_eq!(
        regular_history(&memory, "SKU1").await,
        vec![(Decimal::from(100), ts(1000), ts(2000))]
    );
}

#[tokio::test]
async fn stale_interval_rolls_over_and_is_left_untouched() {
    let memory = Arc::new(MemoryStore::new());
    // now = 2000, window = 500 => staleAfter = 1500, after end = 1000.
    let svc = service(&memory, 500);

    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(1000)).await;
    let Ok(result) = svc
        .reconcile_products("storeA", &[raw("SKU1", "120", None)], ts(2000))
        .await
    else {
        panic!("second run should succeed");
    };

    assert_eq!(result.intervals_created, 1);
    assert_eq!(result.rollovers, 1);
    assert_eq!(
        regular_history(&memory, "SKU1").await,
        vec![
            (Decimal::from(100), ts(1000), ts(1000)),
            (Decimal::from(120), ts(2000), ts(2000)),
        ]
    );

    // The new interval is now current and keeps extending.
    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "120", None)], ts(2100)).await;
    let Ok(Some(current)) = memory
        .find_latest_by_end(&IntervalKey::new("storeA", "SKU1", PriceKind::Regular))
        .await
    else {
        panic!("a current interval should exist");
    };
    assert_eq!((current.price, current.end), (Decimal::from(120), ts(2100)));
}

#[tokio::test]
async fn strict_policy_rolls_over_fresh_intervals() {
    let memory = Arc::new(MemoryStore::new());
    let svc = service_with(
        Arc::clone(&memory) as Arc<dyn PriceStore>,
        Arc::new(CannedSource::default()),
        1500,
        RolloverPolicy::Strict,
    );

    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(1000)).await;
    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "120", None)], ts(2000)).await;

    assert_eq!(regular_history(&memory, "SKU1").await.len(), 2);
}

#[tokio::test]
async fn repeating_an_observation_at_the_same_instant_changes_nothing() {
    let memory = Arc::new(MemoryStore::new());
    let svc = service(&memory, 500);

    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(1000)).await;
    let Ok(second) = svc
        .reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(1000))
        .await
    else {
        panic!("second run should succeed");
    };

    assert_eq!(second.intervals_created, 0);
    assert_eq!(second.intervals_matched, 1);
    assert_eq!(second.intervals_extended, 0);
    assert_eq!(second.metadata_matched, 1);
    assert_eq!(second.metadata_modified, 0);
    assert_eq!(memory.len().await, 1);
}

#[tokio::test]
async fn ended_sale_is_not_closed_or_extended() {
    let memory = Arc::new(MemoryStore::new());
    let svc = service(&memory, 500);

    let _ = svc
        .reconcile_products("storeA", &[raw("SKU1", "100", Some("80"))], ts(1000))
        .await;
    let _ = svc
        .reconcile_products("storeA", &[raw("SKU1", "100", Some("80"))], ts(2000))
        .await;
    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(3000)).await;

    let Ok(Some(sale)) = memory
        .find_latest_by_end(&IntervalKey::new("storeA", "SKU1", PriceKind::Sale))
        .await
    else {
        panic!("sale interval should exist");
    };
    assert_eq!((sale.price, sale.start, sale.end), (Decimal::from(80), ts(1000), ts(2000)));
    assert_eq!(
        regular_history(&memory, "SKU1").await,
        vec![(Decimal::from(100), ts(1000), ts(3000))]
    );
}

#[tokio::test]
async fn sale_price_not_below_list_is_not_a_sale() {
    let memory = Arc::new(MemoryStore::new());
    let svc = service(&memory, 500);

    let Ok(result) = svc
        .reconcile_products("storeA", &[raw("SKU1", "100", Some("100"))], ts(1000))
        .await
    else {
        panic!("run should succeed");
    };
    assert_eq!(result.intervals_created, 1);
}

#[tokio::test]
async fn repeated_sku_keeps_prices_and_metadata_of_its_first_record() {
    let memory = Arc::new(MemoryStore::new());
    let svc = service(&memory, 500);

    let mut repeat = raw("SKU1", "120", Some("90"));
    repeat.title = json!("Renamed product");
    let Ok(result) = svc
        .reconcile_products("storeA", &[raw("SKU1", "100", None), repeat], ts(1000))
        .await
    else {
        panic!("run should succeed");
    };
    assert_eq!(result.intervals_created, 1);
    assert_eq!(result.duplicate_observations, 2);

    assert_eq!(
        regular_history(&memory, "SKU1").await,
        vec![(Decimal::from(100), ts(1000), ts(1000))]
    );
    let Ok(Some(metadata)) = memory.metadata("storeA", "SKU1").await else {
        panic!("metadata should be stored");
    };
    assert_eq!(metadata.name.as_deref(), Some("Product SKU1"));
    let Ok(intervals) = memory.intervals_for("storeA", "SKU1").await else {
        panic!("history should load");
    };
    assert!(intervals.iter().all(|i| i.key.kind == PriceKind::Regular));
}

#[tokio::test]
async fn failed_extensions_are_reported_without_aborting_the_commit() {
    let failing = Arc::new(FailingUpdates::default());
    let svc = service_with(
        Arc::clone(&failing) as Arc<dyn PriceStore>,
        Arc::new(CannedSource::default()),
        500,
        RolloverPolicy::Debounce,
    );

    let _ = svc
        .reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(1000))
        .await;
    let Ok(result) = svc
        .reconcile_products(
            "storeA",
            &[raw("SKU1", "100", None), raw("SKU2", "5", None)],
            ts(2000),
        )
        .await
    else {
        panic!("a partial commit is still a result");
    };

    assert!(result.is_partial());
    assert_eq!(result.failed_operations, 1);
    assert_eq!(result.intervals_extended, 0);
    assert_eq!(result.intervals_created, 1);
    assert_eq!(result.metadata_upserted, 1);
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn a_failing_source_only_fails_its_store() {
    let memory = Arc::new(MemoryStore::new());
    let source = Arc::new(CannedSource::default());
    source.set("storeA", vec![raw("SKU1", "100", None), raw("SKU2", "oops", None)]).await;
    let svc = service_with(
        Arc::clone(&memory) as Arc<dyn PriceStore>,
        Arc::clone(&source),
        500,
        RolloverPolicy::Debounce,
    );

    let Ok(summary) = svc.reconcile_all().await else {
        panic!("run should start");
    };

    let Some(StoreOutcome::Completed(a)) = summary.stores.get("storeA") else {
        panic!("storeA should complete");
    };
    assert_eq!(a.intervals_created, 1);
    assert_eq!(a.skipped_snapshots, 1);
    assert!(matches!(summary.stores.get("storeB"), Some(StoreOutcome::Failed { .. })));
    assert_eq!(summary.failed_stores(), 1);
}

#[tokio::test]
async fn historical_import_chains_intervals_and_seeds_metadata() {
    let memory = Arc::new(MemoryStore::new());
    let importer = HistoricalImporter::new("storeA", OpenEnd::At(ts(10_000)));
    let observations = [(100, 1000), (110, 2000), (100, 4000)]
        .into_iter()
        .map(|(price, at)| Observation {
            sku: "SKU1".into(),
            kind: PriceKind::Regular,
            price: Decimal::from(price),
            observed_at: ts(at),
        })
        .collect();

    assert!(importer.ensure_empty_target(memory.as_ref()).await.is_ok());
    let coordinator = CommitCoordinator::new(Arc::clone(&memory) as Arc<dyn PriceStore>, 2);
    let result = coordinator.commit(importer.stage(observations, ts(20_000))).await;
    assert_eq!(result.intervals_created, 3);
    assert_eq!(result.metadata_seeded, 1);

    // A second import onto the same store would overlap what is there.
    assert!(matches!(
        importer.ensure_empty_target(memory.as_ref()).await,
        Err(ImportError::StoreHasHistory { intervals: 1, .. })
    ));

    assert_eq!(
        regular_history(&memory, "SKU1").await,
        vec![
            (Decimal::from(100), ts(1000), ts(2000)),
            (Decimal::from(110), ts(2000), ts(4000)),
            (Decimal::from(100), ts(4000), ts(10_000)),
        ]
    );

    // Live reconciliation continues from the imported history.
    let svc = service(&memory, 500);
    let _ = svc.reconcile_products("storeA", &[raw("SKU1", "100", None)], ts(10_200)).await;
    let Ok(Some(current)) = memory
        .find_latest_by_end(&IntervalKey::new("storeA", "SKU1", PriceKind::Regular))
        .await
    else {
        panic!("a current interval should exist");
    };
    assert_eq!((current.start, current.end), (ts(4000), ts(10_200)));

    let Ok(Some(meta)) = memory.metadata("storeA", "SKU1").await else {
        panic!("metadata should exist");
    };
    assert_eq!(meta.name.as_deref(), Some("Product SKU1"));
}
