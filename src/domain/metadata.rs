//! Descriptive product attributes, one row per `(store, sku)`.

use serde::{Deserialize, Serialize};

/// Latest known descriptive attributes of a product.
///
/// Overwritten wholesale on every reconciliation cycle that sees the
/// product, regardless of whether its price changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    /// Store name.
    pub store: String,
    /// Store-local product identifier.
    pub sku: String,
    /// Product title.
    pub name: Option<String>,
    /// Brand or manufacturer.
    pub brand: Option<String>,
    /// EAN / GTIN barcode.
    pub ean: Option<String>,
}

impl ProductMetadata {
    /// A metadata row with only its key set, used when a product is known
    /// from price history alone.
    #[must_use]
    pub fn placeholder(store: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            sku: sku.into(),
            name: None,
            brand: None,
            ean: None,
        }
    }
}
