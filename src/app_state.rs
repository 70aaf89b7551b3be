//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::ReconcileService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Reconciliation runs and price queries.
    pub service: Arc<ReconcileService>,
}
