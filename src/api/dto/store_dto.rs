//! Store registry listing.

use serde::Serialize;
use utoipa::ToSchema;

use crate::registry::StoreConfig;

/// One configured store, as listed by `GET /stores`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoreDto {
    /// Store name.
    pub name: String,
    /// Whether runs reconcile this store.
    pub enabled: bool,
    /// Ingestion source: `feed` or `scraper`.
    pub source: String,
}

impl From<&StoreConfig> for StoreDto {
    fn from(store: &StoreConfig) -> Self {
        Self {
            name: store.name.clone(),
            enabled: store.enabled,
            source: store.source.label().to_string(),
        }
    }
}

/// Response body for `GET /stores`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoreListResponse {
    /// Configured stores in registry order.
    pub stores: Vec<StoreDto>,
}
