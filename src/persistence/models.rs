//! Operation outcomes and database row shapes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{IntervalId, IntervalKey, PriceInterval};
use crate::error::PersistenceError;

/// Result of updating one interval by id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Rows matched by the id.
    pub matched: u64,
    /// Rows whose value actually changed.
    pub modified: u64,
}

/// Result of upserting one metadata document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// An existing row was found.
    pub matched: u64,
    /// The existing row's content changed.
    pub modified: u64,
    /// A new row was inserted.
    pub upserted: u64,
}

/// A row of the `price_intervals` table:
/// `(id, store, sku, price_kind, price, start_at, end_at)`.
pub(crate) type IntervalRow = (i64, String, String, String, Decimal, DateTime<Utc>, DateTime<Utc>);

/// A row of the `product_metadata` table: `(store, sku, name, brand, ean)`.
pub(crate) type MetadataRow = (String, String, Option<String>, Option<String>, Option<String>);

/// Maps a stored interval row back into the domain type.
pub(crate) fn interval_from_row(row: IntervalRow) -> Result<PriceInterval, PersistenceError> {
    let (id, store, sku, kind, price, start, end) = row;
    let kind = kind
        .parse()
        .map_err(|e| PersistenceError::Decode(format!("interval {id}: {e}")))?;
    Ok(PriceInterval {
        id: IntervalId::new(id),
        key: IntervalKey::new(store, sku, kind),
        price,
        start,
        end,
    })
}
