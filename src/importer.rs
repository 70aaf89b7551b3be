//! Historical importer: rebuilds intervals from a bulk observation export.
//!
//! Observations are grouped by `(sku, kind)` and sorted by time; each one
//! becomes an interval that ends where the next observation of its group
//! starts. The last interval of a group ends according to [`OpenEnd`].

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::batch::{BatchAccumulator, ReconciliationBatch};
use crate::domain::{IntervalKey, NewInterval, PriceKind};
use crate::error::PersistenceError;
use crate::persistence::PriceStore;

/// One dated price observation from a historical export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Store-local product identifier.
    pub sku: String,
    /// Regular or sale price.
    pub kind: PriceKind,
    /// Observed price.
    pub price: Decimal,
    /// When the price was observed.
    pub observed_at: DateTime<Utc>,
}

/// Where the final interval of each group ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenEnd {
    /// At the last observation itself: the price is only known to hold
    /// until it was last seen.
    #[default]
    LastObserved,
    /// At the moment the import runs.
    ImportTime,
    /// At an explicit cutoff.
    At(DateTime<Utc>),
}

impl OpenEnd {
    fn resolve(self, last_observed: DateTime<Utc>, import_time: DateTime<Utc>) -> DateTime<Utc> {
        let end = match self {
            Self::LastObserved => last_observed,
            Self::ImportTime => import_time,
            Self::At(cutoff) => cutoff,
        };
        end.max(last_observed)
    }
}

impl fmt::Display for OpenEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastObserved => f.write_str("last-observed"),
            Self::ImportTime => f.write_str("now"),
            Self::At(cutoff) => write!(f, "{}", cutoff.to_rfc3339()),
        }
    }
}

/// Error returned for an unparseable [`OpenEnd`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected `last-observed`, `now` or an RFC 3339 timestamp, got {0:?}")]
pub struct InvalidOpenEnd(pub String);

impl FromStr for OpenEnd {
    type Err = InvalidOpenEnd;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-observed" => Ok(Self::LastObserved),
            "now" => Ok(Self::ImportTime),
            other => DateTime::parse_from_rfc3339(other)
                .map(|t| Self::At(t.with_timezone(&Utc)))
                .map_err(|_| InvalidOpenEnd(other.to_string())),
        }
    }
}

/// Reasons an import cannot be committed.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The target store already has intervals; imported ones would overlap them.
    #[error("store {store} already has {intervals} current interval(s)")]
    StoreHasHistory {
        /// Target store.
        store: String,
        /// Keys with a current interval.
        intervals: usize,
    },

    /// The existing history could not be read.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Observations read from an export, plus the lines that were rejected.
#[derive(Debug, Default)]
pub struct ObservationSet {
    /// Parsed observations, in file order.
    pub observations: Vec<Observation>,
    /// Lines that could not be parsed.
    pub skipped: u64,
}

/// Reads JSON-lines observations. Blank lines are ignored; malformed lines
/// are logged and counted.
///
/// # Errors
///
/// Returns an I/O error if the reader fails.
pub fn read_observations<R: BufRead>(reader: R) -> std::io::Result<ObservationSet> {
    let mut set = ObservationSet::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Observation>(&line) {
            Ok(observation) => set.observations.push(observation),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed observation");
                set.skipped += 1;
            }
        }
    }
    Ok(set)
}

/// Rebuilds one store's interval history from observations.
#[derive(Debug, Clone)]
pub struct HistoricalImporter {
    store: String,
    open_end: OpenEnd,
}

impl HistoricalImporter {
    /// Creates an importer for `store`.
    #[must_use]
    pub fn new(store: impl Into<String>, open_end: OpenEnd) -> Self {
        Self {
            store: store.into(),
            open_end,
        }
    }

    /// Derives intervals: within each `(sku, kind)` group sorted by time,
    /// interval `i` ends where interval `i + 1` starts.
    #[must_use]
    pub fn build_intervals(
        &self,
        observations: Vec<Observation>,
        import_time: DateTime<Utc>,
    ) -> Vec<NewInterval> {
        let mut groups: BTreeMap<(String, PriceKind), Vec<Observation>> = BTreeMap::new();
        for observation in observations {
            groups
                .entry((observation.sku.clone(), observation.kind))
                .or_default()
                .push(observation);
        }

        let mut intervals = Vec::new();
        for ((sku, kind), mut group) in groups {
            group.sort_by_key(|o| o.observed_at);
            let key = IntervalKey::new(self.store.as_str(), sku, kind);
            let mut iter = group.into_iter().peekable();
            while let Some(current) = iter.next() {
                let end = match iter.peek() {
                    Some(next) => next.observed_at,
                    None => self.open_end.resolve(current.observed_at, import_time),
                };
                intervals.push(NewInterval {
                    key: key.clone(),
                    price: current.price,
                    start: current.observed_at,
                    end,
                });
            }
        }
        intervals
    }

    /// Checks that `target` holds no intervals for this importer's store.
    ///
    /// Imports only rebuild history from scratch; chaining onto existing
    /// intervals is left to live runs.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::StoreHasHistory`] if any interval exists, or
    /// [`ImportError::Persistence`] if the check itself fails.
    pub async fn ensure_empty_target(&self, target: &dyn PriceStore) -> Result<(), ImportError> {
        let current = target.current_intervals(&self.store).await?;
        if current.is_empty() {
            Ok(())
        } else {
            Err(ImportError::StoreHasHistory {
                store: self.store.clone(),
                intervals: current.len(),
            })
        }
    }

    /// Stages the derived intervals and a metadata seed per SKU.
    #[must_use]
    pub fn stage(
        &self,
        observations: Vec<Observation>,
        import_time: DateTime<Utc>,
    ) -> ReconciliationBatch {
        let mut acc = BatchAccumulator::new(self.store.as_str());
        for interval in self.build_intervals(observations, import_time) {
            acc.seed_metadata(interval.key.store.as_str(), interval.key.sku.as_str());
            acc.stage_interval(interval);
        }
        acc.finish()
    }
}
