//! Store registry: which stores to reconcile and how to fetch them.
//!
//! Loaded from a JSON file at startup and read-only afterwards. Each
//! store names its ingestion source as a tagged [`SourceKind`].
//!
//! ```json
//! [
//!   { "name": "store1", "source": { "type": "feed", "feed_url": "https://url.to/feed.xml" } },
//!   { "name": "store2", "enabled": false, "source": { "type": "scraper", "...": "..." } }
//! ]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// One store to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Unique store name, used as the `store` part of every key.
    pub name: String,
    /// Disabled stores are listed but never reconciled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Where snapshots come from.
    pub source: SourceKind,
}

fn default_enabled() -> bool {
    true
}

/// Ingestion origin of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Google Merchant RSS product feed.
    Feed(FeedOptions),
    /// Paginated HTML catalog.
    Scraper(ScraperOptions),
}

impl SourceKind {
    /// Short label for logs and listings.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Feed(_) => "feed",
            Self::Scraper(_) => "scraper",
        }
    }
}

/// Options of a feed-backed store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedOptions {
    /// URL of the XML feed.
    pub feed_url: String,
}

/// Options of a scraper-backed store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperOptions {
    /// First catalog page; further pages append `&{page_parameter}={n}`.
    pub catalog_search_url: String,
    /// Query parameter selecting the page number.
    pub page_parameter: String,
    /// Selector of the element holding the total product count.
    pub total_products_selector: String,
    /// Per-item selectors.
    pub selectors: ProductSelectors,
    /// Rewrite applied to scraped SKUs.
    #[serde(default)]
    pub sku_sanitizer: Option<SkuSanitizer>,
    /// Stop paging once this many products were collected.
    #[serde(default = "default_max_products")]
    pub max_products: usize,
    /// Pause between page fetches.
    #[serde(default = "default_page_delay_secs")]
    pub page_delay_secs: u64,
}

fn default_max_products() -> usize {
    200
}

fn default_page_delay_secs() -> u64 {
    5
}

/// CSS selectors locating product fields, relative to an item element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSelectors {
    /// Selects each product item on a page.
    pub item: String,
    /// Struck-through previous price, present only during a sale.
    pub old_price: String,
    /// Displayed selling price.
    pub list_price: String,
    /// Product title.
    pub name: String,
    /// Product SKU.
    pub sku: String,
    /// Brand, if the catalog shows one.
    #[serde(default)]
    pub brand: Option<String>,
}

/// Replaces the first occurrence of `value` with `replace` in each SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuSanitizer {
    /// Text to find.
    pub value: String,
    /// Replacement text.
    pub replace: String,
}

impl SkuSanitizer {
    /// Applies the rewrite.
    #[must_use]
    pub fn apply(&self, sku: &str) -> String {
        sku.replacen(&self.value, &self.replace, 1)
    }
}

/// Read-only list of configured stores.
#[derive(Debug, Clone, Default)]
pub struct StoreRegistry {
    stores: Vec<StoreConfig>,
}

impl StoreRegistry {
    /// Builds a registry, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateStore`] if two stores share a name.
    pub fn new(stores: Vec<StoreConfig>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for store in &stores {
            if !seen.insert(store.name.as_str()) {
                return Err(RegistryError::DuplicateStore(store.name.clone()));
            }
        }
        Ok(Self { stores })
    }

    /// Parses a registry from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] for malformed JSON and
    /// [`RegistryError::DuplicateStore`] for repeated names.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Loads a registry file.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if the file cannot be read, otherwise
    /// the errors of [`StoreRegistry::from_json_str`].
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let registry = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        tracing::info!(path = %path.display(), stores = registry.len(), "store registry loaded");
        Ok(registry)
    }

    /// All configured stores.
    #[must_use]
    pub fn stores(&self) -> &[StoreConfig] {
        &self.stores
    }

    /// Stores that take part in reconciliation runs.
    pub fn enabled(&self) -> impl Iterator<Item = &StoreConfig> {
        self.stores.iter().filter(|s| s.enabled)
    }

    /// Looks a store up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StoreConfig> {
        self.stores.iter().find(|s| s.name == name)
    }

    /// Number of configured stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// `true` when no store is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
