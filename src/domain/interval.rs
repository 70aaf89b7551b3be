//! Price validity intervals.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{IntervalKey, PriceKind};

/// Storage-assigned identity of a persisted interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalId(i64);

impl IntervalId {
    /// Wraps a raw storage id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw storage id.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted record asserting that `price` held over `[start, end]`.
///
/// Intervals are only ever appended or have their `end` advanced; none are
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInterval {
    /// Storage identity.
    pub id: IntervalId,
    /// `(store, sku, kind)` this interval belongs to.
    #[serde(flatten)]
    pub key: IntervalKey,
    /// Price that held during the interval.
    pub price: Decimal,
    /// First confirmation.
    pub start: DateTime<Utc>,
    /// Latest confirmation. Never before `start`.
    pub end: DateTime<Utc>,
}

impl PriceInterval {
    /// `true` when `at` falls within `[start, end]`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// An interval staged for insertion; storage assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInterval {
    /// `(store, sku, kind)` this interval belongs to.
    #[serde(flatten)]
    pub key: IntervalKey,
    /// Observed price.
    pub price: Decimal,
    /// First confirmation.
    pub start: DateTime<Utc>,
    /// Latest confirmation.
    pub end: DateTime<Utc>,
}

impl NewInterval {
    /// A zero-length interval opened by a single observation.
    #[must_use]
    pub fn point(key: IntervalKey, price: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            key,
            price,
            start: at,
            end: at,
        }
    }

    /// Attaches the storage id, producing the persisted form.
    #[must_use]
    pub fn with_id(self, id: IntervalId) -> PriceInterval {
        PriceInterval {
            id,
            key: self.key,
            price: self.price,
            start: self.start,
            end: self.end,
        }
    }
}

/// Finds the interval of `kind` that was in effect at `at`.
///
/// When two intervals share a boundary instant the later one wins, since
/// it reflects the price observed at that instant.
#[must_use]
pub fn interval_at(
    intervals: &[PriceInterval],
    kind: PriceKind,
    at: DateTime<Utc>,
) -> Option<&PriceInterval> {
    intervals
        .iter()
        .filter(|i| i.key.kind == kind && i.contains(at))
        .max_by_key(|i| i.start)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    fn interval(id: i64, kind: PriceKind, price: i64, start: i64, end: i64) -> PriceInterval {
        PriceInterval {
            id: IntervalId::new(id),
            key: IntervalKey::new("acme", "SKU1", kind),
            price: Decimal::from(price),
            start: ts(start),
            end: ts(end),
        }
    }

    #[test]
    fn contains_is_inclusive() {
        let i = interval(1, PriceKind::Regular, 100, 1000, 2000);
        assert!(i.contains(ts(1000)));
        assert!(i.contains(ts(2000)));
        assert!(!i.contains(ts(999)));
        assert!(!i.contains(ts(2001)));
    }

    #[test]
    fn interval_at_prefers_later_start_on_shared_boundary() {
        let history = vec![
            interval(1, PriceKind::Regular, 100, 1000, 2000),
            interval(2, PriceKind::Regular, 120, 2000, 3000),
        ];
        let Some(found) = interval_at(&history, PriceKind::Regular, ts(2000)) else {
            panic!("expected an interval at the boundary");
        };
        assert_eq!(found.id, IntervalId::new(2));
    }

    #[test]
    fn interval_at_respects_kind_and_gaps() {
        let history = vec![
            interval(1, PriceKind::Regular, 100, 1000, 2000),
            interval(2, PriceKind::Sale, 80, 1500, 1600),
        ];
        assert!(interval_at(&history, PriceKind::Sale, ts(1800)).is_none());
        assert!(interval_at(&history, PriceKind::Sale, ts(1550)).is_some());
        assert!(interval_at(&history, PriceKind::Regular, ts(5000)).is_none());
    }
}
