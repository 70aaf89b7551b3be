//! The reconciliation rule for a single `(store, sku, kind)` key.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{IntervalKey, NewInterval, PriceInterval};
use crate::error::ConfigError;

/// How a price that differs from a still-fresh current interval is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolloverPolicy {
    /// A differing price only opens a new interval once the current one is
    /// stale; until then the current interval is extended unchanged.
    #[default]
    Debounce,
    /// Any differing price opens a new interval immediately.
    Strict,
}

impl fmt::Display for RolloverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debounce => "debounce",
            Self::Strict => "strict",
        })
    }
}

impl FromStr for RolloverPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debounce" => Ok(Self::Debounce),
            "strict" => Ok(Self::Strict),
            _ => Err(ConfigError {
                key: "ROLLOVER_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// Mutation staged for one key after observing a price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The key has no interval yet.
    CreateInterval(NewInterval),
    /// Push the current interval's `end` forward. Its stored price is
    /// kept even when the observation differed (debounce).
    ExtendInterval {
        /// Interval being extended, as it was before this decision.
        interval: PriceInterval,
        /// New `end`.
        new_end: DateTime<Utc>,
    },
    /// Open a fresh interval at the new price. The superseded interval is
    /// left untouched in storage.
    RolloverInterval {
        /// Current interval being superseded.
        superseded: PriceInterval,
        /// Interval to insert.
        interval: NewInterval,
    },
}

impl Decision {
    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreateInterval(_) => "create",
            Self::ExtendInterval { .. } => "extend",
            Self::RolloverInterval { .. } => "rollover",
        }
    }
}

/// Decides what to stage for `key` given its current interval `prior`.
///
/// - no prior interval: create a point interval at `timestamp`;
/// - same price: extend;
/// - different price and `stale_after > prior.end`: roll over;
/// - different price while the prior interval is still fresh: extend
///   (debounce), unless `policy` is [`RolloverPolicy::Strict`].
///
/// `stale_after` is `now - staleness window`.
#[must_use]
pub fn decide(
    prior: Option<&PriceInterval>,
    key: &IntervalKey,
    observed: Decimal,
    timestamp: DateTime<Utc>,
    stale_after: DateTime<Utc>,
    policy: RolloverPolicy,
) -> Decision {
    let Some(prior) = prior else {
        return Decision::CreateInterval(NewInterval::point(key.clone(), observed, timestamp));
    };

    let changed = prior.price != observed;
    let stale = stale_after > prior.end;
    if changed && (stale || policy == RolloverPolicy::Strict) {
        return Decision::RolloverInterval {
            superseded: prior.clone(),
            interval: NewInterval::point(key.clone(), observed, timestamp),
        };
    }

    Decision::ExtendInterval {
        interval: prior.clone(),
        new_end: timestamp,
    }
}
