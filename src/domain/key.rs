//! Interval keys and price kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which price of a product an interval tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    /// The list price, observed on every snapshot.
    Regular,
    /// The discounted price, observed only while a sale is active.
    Sale,
}

impl PriceKind {
    /// Both kinds, regular first.
    pub const ALL: [Self; 2] = [Self::Regular, Self::Sale];

    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Sale => "sale",
        }
    }
}

impl fmt::Display for PriceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown price kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown price kind: {0}")]
pub struct UnknownPriceKind(pub String);

impl FromStr for PriceKind {
    type Err = UnknownPriceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(Self::Regular),
            "sale" => Ok(Self::Sale),
            other => Err(UnknownPriceKind(other.to_string())),
        }
    }
}

/// Identity of one price history: `(store, sku, price kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntervalKey {
    /// Store name.
    pub store: String,
    /// Store-local product identifier.
    pub sku: String,
    /// Regular or sale price.
    pub kind: PriceKind,
}

impl IntervalKey {
    /// Builds a key from its parts.
    #[must_use]
    pub fn new(store: impl Into<String>, sku: impl Into<String>, kind: PriceKind) -> Self {
        Self {
            store: store.into(),
            sku: sku.into(),
            kind,
        }
    }
}

impl fmt::Display for IntervalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.store, self.sku, self.kind)
    }
}
