//! Interval ledger: the extend / rollover / create decision engine.
//!
//! [`decide`] is the pure rule for one key. [`IntervalLedger`] wraps it
//! with a per-run index of each key's current interval, loaded once per
//! store instead of querying storage per snapshot.

pub mod decision;
pub mod index;

pub use decision::{Decision, RolloverPolicy, decide};
pub use index::IntervalLedger;
