//! Store listing and per-product price queries.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    IntervalDto, PriceAtQuery, PriceAtResponse, ProductHistoryResponse, StoreDto,
    StoreListResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ServiceError};

/// `GET /stores` — List configured stores.
#[utoipa::path(
    get,
    path = "/api/v1/stores",
    tag = "Stores",
    summary = "List stores",
    description = "Returns every store in the registry, including disabled ones.",
    responses(
        (status = 200, description = "Store list", body = StoreListResponse),
    )
)]
pub async fn list_stores(State(state): State<AppState>) -> impl IntoResponse {
    let stores = state
        .service
        .registry()
        .stores()
        .iter()
        .map(StoreDto::from)
        .collect();
    Json(StoreListResponse { stores })
}

/// `GET /stores/{store}/products/{sku}/intervals` — Full price history.
///
/// # Errors
///
/// Returns [`ServiceError`] if the store is unknown or storage fails.
#[utoipa::path(
    get,
    path = "/api/v1/stores/{store}/products/{sku}/intervals",
    tag = "Stores",
    summary = "Product price history",
    description = "Returns every recorded price interval of a product with its latest metadata.",
    params(
        ("store" = String, Path, description = "Store name"),
        ("sku" = String, Path, description = "Product SKU"),
    ),
    responses(
        (status = 200, description = "Interval history", body = ProductHistoryResponse),
        (status = 404, description = "Store not found", body = ErrorResponse),
    )
)]
pub async fn product_intervals(
    State(state): State<AppState>,
    Path((store, sku)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let history = state.service.history(&store, &sku).await?;
    Ok(Json(ProductHistoryResponse {
        store,
        sku,
        metadata: history.metadata.map(Into::into),
        intervals: history.intervals.into_iter().map(IntervalDto::from).collect(),
    }))
}

/// `GET /stores/{store}/products/{sku}/price` — Price in effect at an instant.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidRequest`] for a malformed `at`, and
/// [`ServiceError`] if the store is unknown or storage fails.
#[utoipa::path(
    get,
    path = "/api/v1/stores/{store}/products/{sku}/price",
    tag = "Stores",
    summary = "Price at time",
    description = "Regular and sale intervals containing the given instant (default: now).",
    params(
        ("store" = String, Path, description = "Store name"),
        ("sku" = String, Path, description = "Product SKU"),
        PriceAtQuery,
    ),
    responses(
        (status = 200, description = "Prices in effect", body = PriceAtResponse),
        (status = 400, description = "Malformed timestamp", body = ErrorResponse),
        (status = 404, description = "Store not found", body = ErrorResponse),
    )
)]
pub async fn price_at(
    State(state): State<AppState>,
    Path((store, sku)): Path<(String, String)>,
    query: Result<Query<PriceAtQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Query(query) = query.map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
    let at = query.at.unwrap_or_else(Utc::now);
    let found = state.service.price_at(&store, &sku, at).await?;
    Ok(Json(PriceAtResponse {
        store,
        sku,
        at: found.at,
        regular: found.regular.map(IntervalDto::from),
        sale: found.sale.map(IntervalDto::from),
    }))
}

/// Store routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stores", get(list_stores))
        .route("/stores/{store}/products/{sku}/intervals", get(product_intervals))
        .route("/stores/{store}/products/{sku}/price", get(price_at))
}
