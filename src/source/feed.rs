//! Google Merchant RSS feed source.
//!
//! Items are read with a streaming XML reader. Fields are matched on their
//! local name, so both `<g:price>` and `<price>` are understood.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::Value;

use super::SnapshotSource;
use crate::error::SourceError;
use crate::normalizer::RawProduct;
use crate::registry::{SourceKind, StoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Brand,
    Gtin,
    Price,
    SalePrice,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"id" => Some(Self::Id),
            b"title" => Some(Self::Title),
            b"brand" => Some(Self::Brand),
            b"gtin" => Some(Self::Gtin),
            b"price" => Some(Self::Price),
            b"sale_price" => Some(Self::SalePrice),
            _ => None,
        }
    }
}

fn set_field(product: &mut RawProduct, field: Field, text: String) {
    let slot = match field {
        Field::Id => &mut product.id,
        Field::Title => &mut product.title,
        Field::Brand => &mut product.brand,
        Field::Gtin => &mut product.gtin,
        Field::Price => &mut product.price,
        Field::SalePrice => &mut product.sale_price,
    };
    *slot = Value::String(text);
}

/// Parses a merchant feed document into raw records.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the document is not well-formed XML
/// or has no `<channel>` element.
pub fn parse_feed(xml: &str) -> Result<Vec<RawProduct>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut products = Vec::new();
    let mut current: Option<RawProduct> = None;
    let mut item_depth = 0usize;
    let mut field: Option<Field> = None;
    let mut depth = 0usize;
    let mut saw_channel = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            SourceError::Parse(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => {
                depth += 1;
                let name = start.local_name();
                match name.as_ref() {
                    b"channel" => saw_channel = true,
                    b"item" => {
                        current = Some(RawProduct::default());
                        item_depth = depth;
                    }
                    // Only direct children of <item>; <g:shipping><g:price> is not the list price.
                    other if current.is_some() && depth == item_depth + 1 => {
                        field = Field::from_local_name(other);
                    }
                    _ => field = None,
                }
            }
            Event::End(end) => {
                if end.local_name().as_ref() == b"item" && depth == item_depth {
                    products.extend(current.take());
                }
                depth = depth.saturating_sub(1);
                field = None;
            }
            Event::Text(text) => {
                if let (Some(product), Some(f)) = (current.as_mut(), field) {
                    let text = text
                        .unescape()
                        .map_err(|e| SourceError::Parse(e.to_string()))?;
                    set_field(product, f, text.into_owned());
                }
            }
            Event::CData(data) => {
                if let (Some(product), Some(f)) = (current.as_mut(), field) {
                    let text = String::from_utf8_lossy(&data.into_inner()).trim().to_string();
                    set_field(product, f, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SourceError::Parse("unexpected end of document".to_string()));
    }
    if !saw_channel {
        return Err(SourceError::Parse("no <channel> element".to_string()));
    }
    Ok(products)
}

/// Downloads and parses merchant feeds.
#[derive(Debug, Clone)]
pub struct FeedSource {
    client: reqwest::Client,
}

impl FeedSource {
    /// Creates a feed source over `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for FeedSource {
    async fn fetch_products(&self, store: &StoreConfig) -> Result<Vec<RawProduct>, SourceError> {
        let SourceKind::Feed(options) = &store.source else {
            return Err(SourceError::Unsupported(store.name.clone()));
        };

        tracing::debug!(store = %store.name, url = %options.feed_url, "downloading feed");
        let body = self
            .client
            .get(&options.feed_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let products = parse_feed(&body)?;
        tracing::info!(store = %store.name, products = products.len(), "feed downloaded");
        Ok(products)
    }
}
