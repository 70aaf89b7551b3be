//! Snapshot sources: collaborators that produce raw product records.
//!
//! Every store names its origin as a [`SourceKind`]; [`SourceRouter`]
//! dispatches to the matching [`SnapshotSource`] so the reconciliation
//! core never depends on where records came from.

pub mod feed;
pub mod scraper;

use std::time::Duration;

use async_trait::async_trait;

pub use feed::FeedSource;
pub use scraper::ScraperSource;

use crate::error::SourceError;
use crate::normalizer::RawProduct;
use crate::registry::{SourceKind, StoreConfig};

/// Produces the raw product records of one store for one run.
///
/// The returned records are a finite, one-shot sequence.
#[async_trait]
pub trait SnapshotSource: Send + Sync + std::fmt::Debug {
    /// Fetches every product currently listed by `store`.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be fetched or parsed.
    async fn fetch_products(&self, store: &StoreConfig) -> Result<Vec<RawProduct>, SourceError>;
}

/// Builds the shared HTTP client used by network sources.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("price-ledger/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Dispatches each store to the source matching its [`SourceKind`].
#[derive(Debug, Clone)]
pub struct SourceRouter {
    feed: FeedSource,
    scraper: ScraperSource,
}

impl SourceRouter {
    /// Creates a router whose sources share one HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = http_client(timeout)?;
        Ok(Self {
            feed: FeedSource::new(client.clone()),
            scraper: ScraperSource::new(client),
        })
    }
}

#[async_trait]
impl SnapshotSource for SourceRouter {
    async fn fetch_products(&self, store: &StoreConfig) -> Result<Vec<RawProduct>, SourceError> {
        match &store.source {
            SourceKind::Feed(_) => self.feed.fetch_products(store).await,
            SourceKind::Scraper(_) => self.scraper.fetch_products(store).await,
        }
    }
}
