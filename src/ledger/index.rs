//! Per-run index of current intervals.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::decision::{Decision, RolloverPolicy, decide};
use crate::domain::{IntervalKey, PriceInterval};

/// Current interval per key for one reconciliation run.
///
/// Built from a single bulk read of the store's current intervals, so each
/// decision is a map lookup. A key is decided at most once per run: the
/// first observation wins and later ones are reported as duplicates.
#[derive(Debug, Default)]
pub struct IntervalLedger {
    current: HashMap<IntervalKey, PriceInterval>,
    decided: HashSet<IntervalKey>,
    policy: RolloverPolicy,
}

impl IntervalLedger {
    /// An empty ledger; every key will be created.
    #[must_use]
    pub fn new(policy: RolloverPolicy) -> Self {
        Self {
            current: HashMap::new(),
            decided: HashSet::new(),
            policy,
        }
    }

    /// Indexes `intervals`, keeping the one with the greatest `end` per key.
    #[must_use]
    pub fn from_current(
        intervals: impl IntoIterator<Item = PriceInterval>,
        policy: RolloverPolicy,
    ) -> Self {
        let mut ledger = Self::new(policy);
        for interval in intervals {
            match ledger.current.get(&interval.key) {
                Some(existing) if existing.end >= interval.end => {}
                _ => {
                    ledger.current.insert(interval.key.clone(), interval);
                }
            }
        }
        ledger
    }

    /// Current interval of `key`, if any.
    #[must_use]
    pub fn current(&self, key: &IntervalKey) -> Option<&PriceInterval> {
        self.current.get(key)
    }

    /// Number of keys with a current interval.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// `true` when no key has a current interval.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Decides what to stage for `key` observed at `observed` on `timestamp`.
    ///
    /// Returns `None` when `key` was already decided in this run.
    pub fn reconcile(
        &mut self,
        key: IntervalKey,
        observed: Decimal,
        timestamp: DateTime<Utc>,
        stale_after: DateTime<Utc>,
    ) -> Option<Decision> {
        if self.decided.contains(&key) {
            return None;
        }
        let decision = decide(
            self.current.get(&key),
            &key,
            observed,
            timestamp,
            stale_after,
            self.policy,
        );
        self.decided.insert(key);
        Some(decision)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{IntervalId, PriceKind};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    fn interval(id: i64, sku: &str, price: i64, start: i64, end: i64) -> PriceInterval {
        PriceInterval {
            id: IntervalId::new(id),
            key: IntervalKey::new("acme", sku, PriceKind::Regular),
            price: Decimal::from(price),
            start: ts(start),
            end: ts(end),
        }
    }

    #[test]
    fn keeps_latest_end_per_key() {
        let ledger = IntervalLedger::from_current(
            vec![
                interval(2, "A", 120, 3000, 4000),
                interval(1, "A", 100, 1000, 2000),
                interval(3, "B", 50, 1000, 1000),
            ],
            RolloverPolicy::Debounce,
        );
        assert_eq!(ledger.len(), 2);
        let key = IntervalKey::new("acme", "A", PriceKind::Regular);
        assert_eq!(ledger.current(&key).map(|i| i.id), Some(IntervalId::new(2)));
    }

    #[test]
    fn duplicate_key_in_run_is_decided_once() {
        let mut ledger = IntervalLedger::new(RolloverPolicy::Debounce);
        let key = IntervalKey::new("acme", "A", PriceKind::Regular);

        let first = ledger.reconcile(key.clone(), Decimal::from(100), ts(1000), ts(0));
        assert!(matches!(first, Some(Decision::CreateInterval(_))));

        let second = ledger.reconcile(key, Decimal::from(90), ts(1000), ts(0));
        assert!(second.is_none());
    }

    #[test]
    fn regular_and_sale_are_independent_keys() {
        let mut ledger = IntervalLedger::from_current(
            vec![interval(1, "A", 100, 1000, 1000)],
            RolloverPolicy::Debounce,
        );
        let regular = IntervalKey::new("acme", "A", PriceKind::Regular);
        let sale = IntervalKey::new("acme", "A", PriceKind::Sale);

        let Some(Decision::ExtendInterval { .. }) =
            ledger.reconcile(regular, Decimal::from(100), ts(2000), ts(0))
        else {
            panic!("regular key should extend");
        };
        let Some(Decision::CreateInterval(created)) =
            ledger.reconcile(sale, Decimal::from(80), ts(2000), ts(0))
        else {
            panic!("sale key should be created");
        };
        assert_eq!(created.price, Decimal::from(80));
    }
}
