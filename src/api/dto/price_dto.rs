//! Interval history and price-at-time DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{PriceInterval, ProductMetadata};

/// A price interval.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IntervalDto {
    /// Interval identifier.
    pub id: i64,
    /// `regular` or `sale`.
    pub price_kind: String,
    /// Price held over the interval, as a decimal string.
    pub price: String,
    /// First observation.
    pub start: DateTime<Utc>,
    /// Last confirmation.
    pub end: DateTime<Utc>,
}

impl From<PriceInterval> for IntervalDto {
    fn from(interval: PriceInterval) -> Self {
        Self {
            id: interval.id.get(),
            price_kind: interval.key.kind.to_string(),
            price: interval.price.normalize().to_string(),
            start: interval.start,
            end: interval.end,
        }
    }
}

/// Descriptive attributes of a product.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetadataDto {
    /// Product name.
    pub name: Option<String>,
    /// Brand.
    pub brand: Option<String>,
    /// EAN barcode.
    pub ean: Option<String>,
}

impl From<ProductMetadata> for MetadataDto {
    fn from(metadata: ProductMetadata) -> Self {
        Self {
            name: metadata.name,
            brand: metadata.brand,
            ean: metadata.ean,
        }
    }
}

/// Response body for `GET /stores/{store}/products/{sku}/intervals`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductHistoryResponse {
    /// Store name.
    pub store: String,
    /// Product SKU.
    pub sku: String,
    /// Latest metadata, if the product was ever seen.
    pub metadata: Option<MetadataDto>,
    /// Every interval, ordered by kind then start.
    pub intervals: Vec<IntervalDto>,
}

/// Query parameters for `GET /stores/{store}/products/{sku}/price`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PriceAtQuery {
    /// RFC 3339 instant to look up. Defaults to now.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// Response body for `GET /stores/{store}/products/{sku}/price`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PriceAtResponse {
    /// Store name.
    pub store: String,
    /// Product SKU.
    pub sku: String,
    /// Queried instant.
    pub at: DateTime<Utc>,
    /// Regular price in effect, if any.
    pub regular: Option<IntervalDto>,
    /// Sale price in effect, if any.
    pub sale: Option<IntervalDto>,
}
