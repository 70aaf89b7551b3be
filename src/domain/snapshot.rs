//! Canonical product snapshot produced by the normalizer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{IntervalKey, PriceKind, ProductMetadata};

/// One observation of a product at ingestion time.
///
/// Built fresh per ingestion cycle by [`crate::normalizer::normalize`] and
/// discarded once reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Store the product was observed in.
    pub store: String,
    /// Store-local product identifier, stable across time.
    pub sku: String,
    /// Product title. Empty when the source did not provide one.
    pub title: String,
    /// Brand or manufacturer.
    pub brand: Option<String>,
    /// EAN / GTIN barcode.
    pub gtin: Option<String>,
    /// Regular (list) price.
    pub list_price: Decimal,
    /// Discounted price. Only present when strictly below `list_price`.
    pub sale_price: Option<Decimal>,
}

impl ProductSnapshot {
    /// `true` when a sale price is present and strictly below the list price.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        matches!(self.sale_price, Some(sale) if sale < self.list_price)
    }

    /// Price observations carried by this snapshot: always the regular
    /// price, plus the sale price while on sale.
    #[must_use]
    pub fn observations(&self) -> Vec<(PriceKind, Decimal)> {
        let mut out = vec![(PriceKind::Regular, self.list_price)];
        if let Some(sale) = self.sale_price.filter(|_| self.is_on_sale()) {
            out.push((PriceKind::Sale, sale));
        }
        out
    }

    /// Interval key of this product for the given price kind.
    #[must_use]
    pub fn key(&self, kind: PriceKind) -> IntervalKey {
        IntervalKey::new(self.store.as_str(), self.sku.as_str(), kind)
    }

    /// Descriptive attributes to upsert for this product.
    #[must_use]
    pub fn metadata(&self) -> ProductMetadata {
        ProductMetadata {
            store: self.store.clone(),
            sku: self.sku.clone(),
            name: (!self.title.is_empty()).then(|| self.title.clone()),
            brand: self.brand.clone(),
            ean: self.gtin.clone(),
        }
    }
}
