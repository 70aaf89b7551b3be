//! Snapshot normalizer: loosely-typed source records to [`ProductSnapshot`].
//!
//! Feeds and scrapers hand over [`RawProduct`]s whose fields may be JSON
//! strings, numbers or absent. [`normalize`] validates the required fields
//! (`sku`, list price), coerces identifiers to trimmed strings and derives
//! the sale condition.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ProductSnapshot;
use crate::error::ValidationError;

/// A product record as produced by a snapshot source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    /// Product identifier (`g:id` in merchant feeds).
    #[serde(default)]
    pub id: Value,
    /// Product title.
    #[serde(default)]
    pub title: Value,
    /// Brand or manufacturer.
    #[serde(default)]
    pub brand: Value,
    /// EAN / GTIN barcode.
    #[serde(default)]
    pub gtin: Value,
    /// List price.
    #[serde(default)]
    pub price: Value,
    /// Sale price, if any.
    #[serde(default)]
    pub sale_price: Value,
}

/// Validates and coerces one raw record into a snapshot for `store`.
///
/// # Errors
///
/// Returns [`ValidationError::MissingField`] when the identifier or list
/// price is absent, [`ValidationError::NotNumeric`] when the list price
/// cannot be read as a number and [`ValidationError::NegativePrice`] when
/// it is below zero. A malformed sale price is not an error: the snapshot
/// simply carries no sale observation.
pub fn normalize(store: &str, raw: &RawProduct) -> Result<ProductSnapshot, ValidationError> {
    let sku = coerce_text(&raw.id).ok_or(ValidationError::MissingField("sku"))?;
    let list_price = parse_price("listPrice", &raw.price)?
        .ok_or(ValidationError::MissingField("listPrice"))?;

    let sale_price = match parse_price("salePrice", &raw.sale_price) {
        Ok(Some(sale)) if sale < list_price => Some(sale),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(store, %sku, error = %err, "ignoring unusable sale price");
            None
        }
    };

    Ok(ProductSnapshot {
        store: store.to_string(),
        sku,
        title: coerce_text(&raw.title).unwrap_or_default(),
        brand: coerce_text(&raw.brand),
        gtin: coerce_text(&raw.gtin),
        list_price,
        sale_price,
    })
}

/// Coerces a loosely-typed identifier to its canonical string form.
///
/// Strings are trimmed, numbers and booleans are rendered; null, blank
/// strings and nested values yield `None`.
#[must_use]
pub fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Reads a price from a JSON number or a string such as `"1299.00 ISK"`.
///
/// Returns `Ok(None)` for null or blank values.
///
/// # Errors
///
/// Returns [`ValidationError::NotNumeric`] for values that do not start
/// with a number and [`ValidationError::NegativePrice`] for negative
/// amounts.
pub fn parse_price(field: &'static str, value: &Value) -> Result<Option<Decimal>, ValidationError> {
    let not_numeric = || ValidationError::NotNumeric {
        field,
        value: value.to_string(),
    };

    let price = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => decimal_from_str(&n.to_string()).ok_or_else(not_numeric)?,
        Value::String(s) => {
            let Some(token) = leading_number(s) else {
                if s.trim().is_empty() {
                    return Ok(None);
                }
                return Err(not_numeric());
            };
            decimal_from_str(&token).ok_or_else(not_numeric)?
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => return Err(not_numeric()),
    };

    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::NegativePrice(field));
    }
    Ok(Some(price))
}

/// Extracts the leading numeric token of a price string, e.g. `"15.00"`
/// from `"15.00 USD"`. A lone comma is read as the decimal separator.
fn leading_number(s: &str) -> Option<String> {
    let token: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
        .collect();
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if token.contains(',') && !token.contains('.') && token.matches(',').count() == 1 {
        return Some(token.replace(',', "."));
    }
    Some(token.replace(',', ""))
}

fn decimal_from_str(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
        .map(|d| d.normalize())
}
