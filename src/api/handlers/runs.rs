//! Run trigger: reconcile every enabled store now.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::RunSummaryResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, ServiceError};

/// `POST /runs` — Trigger a reconciliation run.
///
/// # Errors
///
/// Returns [`ServiceError::RunInProgress`] if a run is already executing.
#[utoipa::path(
    post,
    path = "/api/v1/runs",
    tag = "Runs",
    summary = "Reconcile all stores",
    description = "Reconciles every enabled store once; store failures are reported in the body.",
    responses(
        (status = 200, description = "Run finished", body = RunSummaryResponse),
        (status = 409, description = "A run is already in progress", body = ErrorResponse),
    )
)]
pub async fn trigger_run(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.service.reconcile_all().await?;
    Ok(Json(RunSummaryResponse::from(summary)))
}

/// Run routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/runs", post(trigger_run))
}
