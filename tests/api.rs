//! HTTP surface tests driven through the router with `oneshot`.

#![allow(clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use price_ledger::api;
use price_ledger::app_state::AppState;
use price_ledger::error::SourceError;
use price_ledger::normalizer::RawProduct;
use price_ledger::persistence::MemoryStore;
use price_ledger::registry::{StoreConfig, StoreRegistry};
use price_ledger::service::{ReconcileOptions, ReconcileService};
use price_ledger::source::SnapshotSource;

const REGISTRY: &str = r#"[
    { "name": "storeA", "source": { "type": "feed", "feed_url": "https://a.example/feed.xml" } },
    {
        "name": "storeB",
        "enabled": false,
        "source": { "type": "feed", "feed_url": "https://b.example/feed.xml" }
    }
]"#;

#[derive(Debug)]
struct OneProduct;

#[async_trait]
impl SnapshotSource for OneProduct {
    async fn fetch_products(&self, _store: &StoreConfig) -> Result<Vec<RawProduct>, SourceError> {
        Ok(vec![kettle()])
    }
}

fn kettle() -> RawProduct {
    RawProduct {
        id: json!(1001),
        title: json!("Kettle"),
        price: json!("1299.00 ISK"),
        sale_price: json!("999.00 ISK"),
        ..RawProduct::default()
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn app() -> (Router, Arc<ReconcileService>) {
    let Ok(registry) = StoreRegistry::from_json_str(REGISTRY) else {
        panic!("registry should parse");
    };
    let service = Arc::new(ReconcileService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(OneProduct),
        Arc::new(registry),
        ReconcileOptions::default(),
    ));
    let router = api::build_router().with_state(AppState {
        service: Arc::clone(&service),
    });
    (router, service)
}

async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let Ok(request) = Request::builder().method(method).uri(uri).body(Body::empty()) else {
        panic!("request should build");
    };
    let Ok(response) = router.oneshot(request).await else {
        panic!("router is infallible");
    };
    let status = response.status();
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body should be readable");
    };
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_healthy() {
    let (router, _) = app();
    let (status, body) = send(router, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["enabled_stores"], 1);
}

#[tokio::test]
async fn lists_every_configured_store() {
    let (router, _) = app();
    let (status, body) = send(router, "GET", "/api/v1/stores").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["stores"],
        json!([
            { "name": "storeA", "enabled": true, "source": "feed" },
            { "name": "storeB", "enabled": false, "source": "feed" },
        ])
    );
}

#[tokio::test]
async fn run_reconciles_enabled_stores_only() {
    let (router, _) = app();
    let (status, body) = send(router, "POST", "/api/v1/runs").await;
    assert_eq!(status, StatusCode::OK);

    let stores = &body["stores"];
    assert_eq!(stores["storeA"]["status"], "completed");
    assert_eq!(stores["storeA"]["result"]["intervals_created"], 2);
    assert!(stores.get("storeB").is_none());
}

#[tokio::test]
async fn price_and_history_after_a_run() {
    let (router, service) = app();
    let Ok(_) = service.reconcile_products("storeA", &[kettle()], ts(1_700_000_000)).await else {
        panic!("reconcile should succeed");
    };

    let (status, body) = send(
        router.clone(),
        "GET",
        "/api/v1/stores/storeA/products/1001/price?at=2023-11-14T22:13:20Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["regular"]["price"], "1299");
    assert_eq!(body["sale"]["price"], "999");

    let (status, body) = send(router, "GET", "/api/v1/stores/storeA/products/1001/intervals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["name"], "Kettle");
    assert_eq!(body["intervals"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn unknown_store_is_a_404_with_error_body() {
    let (router, _) = app();
    let (status, body) = send(router, "GET", "/api/v1/stores/nope/products/1/intervals").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn malformed_instant_is_a_400_with_error_body() {
    let (router, _) = app();
    let (status, body) = send(
        router,
        "GET",
        "/api/v1/stores/storeA/products/1001/price?at=yesterday",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);
}
