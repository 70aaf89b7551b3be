//! In-process store: an interval arena with a current-interval index.
//!
//! Intervals live in a `Vec` whose slot determines the id (`slot + 1`);
//! a `HashMap` maps each key to the slot of its current interval, so the
//! latest-by-end lookup is a single probe.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::PriceStore;
use super::models::{UpdateOutcome, UpsertOutcome};
use crate::domain::{IntervalId, IntervalKey, NewInterval, PriceInterval, ProductMetadata};
use crate::error::PersistenceError;

#[derive(Debug, Default)]
struct MemoryState {
    intervals: Vec<PriceInterval>,
    latest: HashMap<IntervalKey, usize>,
    metadata: HashMap<(String, String), ProductMetadata>,
}

impl MemoryState {
    fn slot_of(id: IntervalId) -> Option<usize> {
        usize::try_from(id.get()).ok()?.checked_sub(1)
    }

    fn push(&mut self, interval: NewInterval) -> Result<(), PersistenceError> {
        let slot = self.intervals.len();
        let id = i64::try_from(slot + 1)
            .map_err(|_| PersistenceError::Unavailable("interval arena is full".to_string()))?;
        self.intervals.push(interval.with_id(IntervalId::new(id)));
        self.refresh_latest(slot);
        Ok(())
    }

    /// Points the key of `slot` at it unless a later-ending interval is current.
    fn refresh_latest(&mut self, slot: usize) {
        let Some(candidate) = self.intervals.get(slot) else {
            return;
        };
        let current_end = self
            .latest
            .get(&candidate.key)
            .and_then(|&current| self.intervals.get(current))
            .map(|current| current.end);
        if current_end.is_none_or(|end| end <= candidate.end) {
            self.latest.insert(candidate.key.clone(), slot);
        }
    }
}

/// Volatile [`PriceStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored interval in insertion order.
    pub async fn all_intervals(&self) -> Vec<PriceInterval> {
        self.state.read().await.intervals.clone()
    }

    /// Number of stored intervals.
    pub async fn len(&self) -> usize {
        self.state.read().await.intervals.len()
    }

    /// `true` when no interval is stored.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.intervals.is_empty()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn find_latest_by_end(
        &self,
        key: &IntervalKey,
    ) -> Result<Option<PriceInterval>, PersistenceError> {
        let state = self.state.read().await;
        Ok(state
            .latest
            .get(key)
            .and_then(|&slot| state.intervals.get(slot))
            .cloned())
    }

    async fn current_intervals(&self, store: &str) -> Result<Vec<PriceInterval>, PersistenceError> {
        let state = self.state.read().await;
        Ok(state
            .latest
            .iter()
            .filter(|(key, _)| key.store == store)
            .filter_map(|(_, &slot)| state.intervals.get(slot).cloned())
            .collect())
    }

    async fn insert_many(&self, intervals: Vec<NewInterval>) -> Result<u64, PersistenceError> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for interval in intervals {
            state.push(interval)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update_end(
        &self,
        id: IntervalId,
        end: DateTime<Utc>,
    ) -> Result<UpdateOutcome, PersistenceError> {
        let mut state = self.state.write().await;
        let Some(slot) = MemoryState::slot_of(id) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(interval) = state.intervals.get_mut(slot) else {
            return Ok(UpdateOutcome::default());
        };
        let modified = u64::from(interval.end != end);
        interval.end = end;
        state.refresh_latest(slot);
        Ok(UpdateOutcome {
            matched: 1,
            modified,
        })
    }

    async fn upsert_metadata(
        &self,
        metadata: ProductMetadata,
    ) -> Result<UpsertOutcome, PersistenceError> {
        let mut state = self.state.write().await;
        let key = (metadata.store.clone(), metadata.sku.clone());
        let outcome = match state.metadata.get(&key) {
            Some(existing) if *existing == metadata => UpsertOutcome {
                matched: 1,
                modified: 0,
                upserted: 0,
            },
            Some(_) => UpsertOutcome {
                matched: 1,
                modified: 1,
                upserted: 0,
            },
            None => UpsertOutcome {
                matched: 0,
                modified: 0,
                upserted: 1,
            },
        };
        state.metadata.insert(key, metadata);
        Ok(outcome)
    }

    async fn seed_metadata(&self, store: &str, sku: &str) -> Result<bool, PersistenceError> {
        let mut state = self.state.write().await;
        let key = (store.to_string(), sku.to_string());
        if state.metadata.contains_key(&key) {
            return Ok(false);
        }
        state
            .metadata
            .insert(key, ProductMetadata::placeholder(store, sku));
        Ok(true)
    }

    async fn intervals_for(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Vec<PriceInterval>, PersistenceError> {
        let state = self.state.read().await;
        let mut found: Vec<PriceInterval> = state
            .intervals
            .iter()
            .filter(|i| i.key.store == store && i.key.sku == sku)
            .cloned()
            .collect();
        found.sort_by_key(|i| (i.key.kind, i.start));
        Ok(found)
    }

    async fn metadata(
        &self,
        store: &str,
        sku: &str,
    ) -> Result<Option<ProductMetadata>, PersistenceError> {
        let state = self.state.read().await;
        Ok(state
            .metadata
            .get(&(store.to_string(), sku.to_string()))
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::PriceKind;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    fn key(sku: &str) -> IntervalKey {
        IntervalKey::new("acme", sku, PriceKind::Regular)
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_indexes_latest() {
        let store = MemoryStore::new();
        let inserted = store
            .insert_many(vec![
                NewInterval::point(key("A"), Decimal::from(100), ts(1000)),
                NewInterval::point(key("A"), Decimal::from(120), ts(5000)),
                NewInterval::point(key("B"), Decimal::from(7), ts(1000)),
            ])
            .await;
        assert_eq!(inserted.ok(), Some(3));

        let Ok(Some(latest)) = store.find_latest_by_end(&key("A")).await else {
            panic!("expected a current interval for A");
        };
        assert_eq!(latest.id, IntervalId::new(2));
        assert_eq!(latest.price, Decimal::from(120));

        let Ok(current) = store.current_intervals("acme").await else {
            panic!("current_intervals failed");
        };
        assert_eq!(current.len(), 2);
        let Ok(other) = store.current_intervals("other").await else {
            panic!("current_intervals failed");
        };
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn update_end_reports_matched_and_modified() {
        let store = MemoryStore::new();
        let _ = store
            .insert_many(vec![NewInterval::point(key("A"), Decimal::from(100), ts(1000))])
            .await;

        let first = store.update_end(IntervalId::new(1), ts(2000)).await;
        assert_eq!(first.ok(), Some(UpdateOutcome { matched: 1, modified: 1 }));

        let again = store.update_end(IntervalId::new(1), ts(2000)).await;
        assert_eq!(again.ok(), Some(UpdateOutcome { matched: 1, modified: 0 }));

        let missing = store.update_end(IntervalId::new(42), ts(2000)).await;
        assert_eq!(missing.ok(), Some(UpdateOutcome::default()));
    }

    #[tokio::test]
    async fn identical_metadata_upsert_is_not_a_modification() {
        let store = MemoryStore::new();
        let mut meta = ProductMetadata::placeholder("acme", "A");
        meta.name = Some("Kettle".into());

        let first = store.upsert_metadata(meta.clone()).await;
        assert_eq!(first.ok(), Some(UpsertOutcome { matched: 0, modified: 0, upserted: 1 }));

        let second = store.upsert_metadata(meta.clone()).await;
        assert_eq!(second.ok(), Some(UpsertOutcome { matched: 1, modified: 0, upserted: 0 }));

        meta.brand = Some("Brew".into());
        let third = store.upsert_metadata(meta).await;
        assert_eq!(third.ok(), Some(UpsertOutcome { matched: 1, modified: 1, upserted: 0 }));
    }

    #[tokio::test]
    async fn seed_never_overwrites() {
        let store = MemoryStore::new();
        let mut meta = ProductMetadata::placeholder("acme", "A");
        meta.name = Some("Kettle".into());
        let _ = store.upsert_metadata(meta).await;

        assert_eq!(store.seed_metadata("acme", "A").await.ok(), Some(false));
        assert_eq!(store.seed_metadata("acme", "B").await.ok(), Some(true));

        let Ok(Some(kept)) = store.metadata("acme", "A").await else {
            panic!("metadata for A should exist");
        };
        assert_eq!(kept.name.as_deref(), Some("Kettle"));
    }
}
