//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints except `/health` are mounted under `/api/v1`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "price-ledger", description = "Retail price interval history"),
    paths(
        handlers::system::health_handler,
        handlers::runs::trigger_run,
        handlers::stores::list_stores,
        handlers::stores::product_intervals,
        handlers::stores::price_at,
    ),
    components(schemas(
        handlers::system::HealthResponse,
        dto::RunSummaryResponse,
        dto::StoreOutcomeDto,
        crate::commit::ReconciliationResult,
        dto::StoreListResponse,
        dto::StoreDto,
        dto::ProductHistoryResponse,
        dto::MetadataDto,
        dto::IntervalDto,
        dto::PriceAtResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Runs", description = "Reconciliation triggers"),
        (name = "Stores", description = "Stores and price history"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
