//! price-ledger server entry point.
//!
//! Starts the Axum HTTP server exposing the run trigger and the price
//! history queries, and optionally reconciles every store once at startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use price_ledger::api;
use price_ledger::app_state::AppState;
use price_ledger::config::AppConfig;
use price_ledger::persistence;
use price_ledger::registry::StoreRegistry;
use price_ledger::service::{ReconcileOptions, ReconcileService};
use price_ledger::source::SourceRouter;
use price_ledger::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;
    telemetry::init(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting price-ledger");

    // Build collaborators
    let store = persistence::open(&config)
        .await
        .context("opening price store")?;
    let registry = Arc::new(
        StoreRegistry::load(&config.stores_path)
            .with_context(|| format!("loading {}", config.stores_path.display()))?,
    );
    let source = Arc::new(SourceRouter::new(Duration::from_secs(config.http_timeout_secs))?);

    // Build service layer
    let service = Arc::new(ReconcileService::new(
        store,
        source,
        registry,
        ReconcileOptions::from(&config),
    ));

    if config.run_on_startup {
        let startup = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = startup.reconcile_all().await {
                tracing::warn!(error = %e, "startup run skipped");
            }
        });
    }

    // Build router
    let app = Router::new().merge(api::build_router());

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { service });

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
