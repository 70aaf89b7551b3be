//! Paginated HTML catalog source.
//!
//! The first page reports the total product count; further pages are
//! requested as `{catalog_search_url}&{page_parameter}={n}` until the
//! total or `max_products` is reached, or a page comes back empty.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::SnapshotSource;
use crate::error::SourceError;
use crate::normalizer::RawProduct;
use crate::registry::{ScraperOptions, SourceKind, StoreConfig};

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Selector(format!("{css}: {e:?}")))
}

fn text_of(item: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text: String = item.select(selector).next()?.text().collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn digits_of(item: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let digits: String = text_of(item, selector)?
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    (!digits.is_empty()).then_some(digits)
}

fn text_value(text: Option<String>) -> Value {
    text.map_or(Value::Null, Value::String)
}

/// Reads the total product count announced by a catalog page.
///
/// A missing element or one without digits counts as zero.
///
/// # Errors
///
/// Returns [`SourceError::Selector`] if `total_selector` is not valid CSS.
pub fn parse_total(html: &str, total_selector: &str) -> Result<usize, SourceError> {
    let document = Html::parse_document(html);
    let total = selector(total_selector)?;
    let digits: String = document
        .select(&total)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    Ok(digits.parse().unwrap_or(0))
}

/// Extracts the product items of one catalog page.
///
/// Prices keep their digits only. When an item shows a struck-through old
/// price, that is the list price and the displayed price is the sale
/// price; otherwise the displayed price is both, and the normalizer drops
/// the sale observation. Items without a SKU are returned with a null `id`
/// so that normalization counts them as skipped.
///
/// # Errors
///
/// Returns [`SourceError::Selector`] if any configured selector is invalid.
pub fn parse_page(html: &str, options: &ScraperOptions) -> Result<Vec<RawProduct>, SourceError> {
    let document = Html::parse_document(html);
    let selectors = &options.selectors;
    let item = selector(&selectors.item)?;
    let old_price = selector(&selectors.old_price)?;
    let list_price = selector(&selectors.list_price)?;
    let name = selector(&selectors.name)?;
    let sku_selector = selector(&selectors.sku)?;
    let brand = selectors.brand.as_deref().map(selector).transpose()?;

    let products = document
        .select(&item)
        .map(|el| {
            let displayed = digits_of(&el, &list_price);
            let (list, sale) = match digits_of(&el, &old_price) {
                Some(old) => (Some(old), displayed),
                None => (displayed.clone(), displayed),
            };
            let sku = text_of(&el, &sku_selector).map(|raw| match &options.sku_sanitizer {
                Some(sanitizer) => sanitizer.apply(&raw),
                None => raw,
            });
            RawProduct {
                id: text_value(sku),
                title: text_value(text_of(&el, &name)),
                brand: text_value(brand.as_ref().and_then(|b| text_of(&el, b))),
                gtin: Value::Null,
                price: text_value(list),
                sale_price: text_value(sale),
            }
        })
        .collect();
    Ok(products)
}

/// Walks paginated catalogs over HTTP.
#[derive(Debug, Clone)]
pub struct ScraperSource {
    client: reqwest::Client,
}

impl ScraperSource {
    /// Creates a scraper over `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, SourceError> {
        tracing::debug!(url, "fetching catalog page");
        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }
}

#[async_trait]
impl SnapshotSource for ScraperSource {
    async fn fetch_products(&self, store: &StoreConfig) -> Result<Vec<RawProduct>, SourceError> {
        let SourceKind::Scraper(options) = &store.source else {
            return Err(SourceError::Unsupported(store.name.clone()));
        };

        let first = self.fetch_page(&options.catalog_search_url).await?;
        let total = parse_total(&first, &options.total_products_selector)?;
        let limit = total.min(options.max_products);
        let mut products = parse_page(&first, options)?;

        let mut page = 1u32;
        while products.len() < limit {
            page += 1;
            tokio::time::sleep(Duration::from_secs(options.page_delay_secs)).await;
            let url = format!(
                "{}&{}={page}",
                options.catalog_search_url, options.page_parameter
            );
            let found = parse_page(&self.fetch_page(&url).await?, options)?;
            if found.is_empty() {
                tracing::warn!(store = %store.name, page, "catalog page had no products, stopping");
                break;
            }
            products.extend(found);
        }

        tracing::info!(
            store = %store.name,
            total,
            products = products.len(),
            pages = page,
            "catalog scraped"
        );
        Ok(products)
    }
}
