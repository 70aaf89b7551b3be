//! Batch accumulator: buffers the writes of one reconciliation run.
//!
//! A [`BatchAccumulator`] is created per run, receives ledger decisions and
//! metadata upserts, and is turned into a [`ReconciliationBatch`] that the
//! [`crate::commit::CommitCoordinator`] consumes exactly once. Nothing is
//! written until then.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::domain::{IntervalId, IntervalKey, NewInterval, ProductMetadata};
use crate::ledger::Decision;

/// An `end` update for an existing interval, keyed by its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalExtension {
    /// Interval to update.
    pub id: IntervalId,
    /// Key of the interval, for logging.
    pub key: IntervalKey,
    /// New `end` value.
    pub end: DateTime<Utc>,
}

/// Bookkeeping collected while staging, reported with the commit result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingStats {
    /// New intervals that supersede a previous one.
    pub rollovers: u64,
    /// Records rejected by the normalizer.
    pub skipped_snapshots: u64,
    /// Observations ignored because their key was already decided.
    pub duplicate_observations: u64,
}

/// Writes staged for one store, ready to be committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationBatch {
    /// Store the batch belongs to.
    pub store: String,
    /// Intervals to insert.
    pub new_intervals: Vec<NewInterval>,
    /// Existing intervals whose `end` advances.
    pub extensions: Vec<IntervalExtension>,
    /// Metadata documents to upsert, one per `(store, sku)`.
    pub metadata: Vec<ProductMetadata>,
    /// `(store, sku)` pairs that need a metadata row if none exists.
    pub metadata_seeds: Vec<(String, String)>,
    /// Staging bookkeeping.
    pub stats: StagingStats,
}

impl ReconciliationBatch {
    /// `true` when there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_intervals.is_empty()
            && self.extensions.is_empty()
            && self.metadata.is_empty()
            && self.metadata_seeds.is_empty()
    }
}

/// In-memory buffer for one run's writes.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    store: String,
    new_intervals: Vec<NewInterval>,
    extensions: Vec<IntervalExtension>,
    metadata: BTreeMap<(String, String), ProductMetadata>,
    seeds: BTreeSet<(String, String)>,
    stats: StagingStats,
}

impl BatchAccumulator {
    /// Starts an empty batch for `store`.
    #[must_use]
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            ..Self::default()
        }
    }

    /// Stages the write implied by a ledger decision.
    pub fn stage(&mut self, decision: Decision) {
        match decision {
            Decision::CreateInterval(interval) => self.new_intervals.push(interval),
            Decision::ExtendInterval { interval, new_end } => {
                self.extensions.push(IntervalExtension {
                    id: interval.id,
                    key: interval.key,
                    end: new_end,
                });
            }
            Decision::RolloverInterval { interval, .. } => {
                self.stats.rollovers += 1;
                self.new_intervals.push(interval);
            }
        }
    }

    /// Stages an interval built outside the ledger (historical import).
    pub fn stage_interval(&mut self, interval: NewInterval) {
        self.new_intervals.push(interval);
    }

    /// Stages a metadata upsert. The first document for a `(store, sku)`
    /// is kept, matching the ledger's first-observation rule.
    pub fn upsert_metadata(&mut self, metadata: ProductMetadata) {
        self.metadata
            .entry((metadata.store.clone(), metadata.sku.clone()))
            .or_insert(metadata);
    }

    /// Requests an empty metadata row for `(store, sku)` if none exists.
    pub fn seed_metadata(&mut self, store: impl Into<String>, sku: impl Into<String>) {
        self.seeds.insert((store.into(), sku.into()));
    }

    /// Counts a record rejected by the normalizer.
    pub fn record_skipped(&mut self) {
        self.stats.skipped_snapshots += 1;
    }

    /// Counts an observation whose key was already decided this run.
    pub fn record_duplicate(&mut self) {
        self.stats.duplicate_observations += 1;
    }

    /// Number of staged interval inserts and extensions.
    #[must_use]
    pub fn staged_interval_writes(&self) -> usize {
        self.new_intervals.len() + self.extensions.len()
    }

    /// Closes the buffer and hands the batch over for commit.
    #[must_use]
    pub fn finish(self) -> ReconciliationBatch {
        ReconciliationBatch {
            store: self.store,
            new_intervals: self.new_intervals,
            extensions: self.extensions,
            metadata: self.metadata.into_values().collect(),
            metadata_seeds: self.seeds.into_iter().collect(),
            stats: self.stats,
        }
    }
}
