//! Domain layer: snapshots, price intervals, metadata and identifiers.
//!
//! Everything in here is plain data with no I/O. The interval model is
//! keyed by [`IntervalKey`] `(store, sku, price kind)`; for a fixed key,
//! intervals never overlap and the one with the latest `end` is current.

pub mod interval;
pub mod key;
pub mod metadata;
pub mod run_id;
pub mod snapshot;

pub use interval::{IntervalId, NewInterval, PriceInterval, interval_at};
pub use key::{IntervalKey, PriceKind};
pub use metadata::ProductMetadata;
pub use run_id::RunId;
pub use snapshot::ProductSnapshot;
