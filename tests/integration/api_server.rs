//! Integration tests for the HTTP control plane
//!
//! Tests health, metrics and the session endpoints against a supervisor
//! wired to in-memory collaborators.

use axum_test::TestServer;
use pulsewatch::core::http::{create_router, AppState, HealthStatus};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::test_utils::{symbols, within, StaticCatalog, TestSupervisor};

/// Test helper for API server integration tests
#[allow(dead_code)]
struct TestApiServer {
    server: TestServer,
    engine: TestSupervisor,
    health: Arc<RwLock<HealthStatus>>,
}

impl TestApiServer {
    fn new(catalog: StaticCatalog) -> Self {
        let engine = TestSupervisor::new(catalog);
        let health = Arc::new(RwLock::new(HealthStatus::default()));
        let state = AppState {
            health: health.clone(),
            metrics: engine.metrics.clone(),
            start_time: Arc::new(Instant::now()),
            supervisor: engine.supervisor.clone(),
        };

        let server = TestServer::new(create_router(state)).expect("start test server");
        Self {
            server,
            engine,
            health,
        }
    }

    fn with_symbols(names: &[&str]) -> Self {
        Self::new(StaticCatalog::Symbols(symbols(names)))
    }
}

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::with_symbols(&[]);
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "pulsewatch");
    assert!(body.get("reason").is_none());
}

#[tokio::test]
async fn health_endpoint_reports_degraded_status() {
    let app = TestApiServer::with_symbols(&[]);
    app.health
        .write()
        .await
        .degrade("favorites store unavailable");

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["reason"], "favorites store unavailable");
}

#[tokio::test]
async fn metrics_endpoint_exposes_engine_metrics() {
    let app = TestApiServer::with_symbols(&[]);
    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    for name in [
        "http_requests_total",
        "http_request_duration_seconds",
        "http_requests_in_flight",
        "active_sessions",
        "active_streams",
        "alerts_sent_total",
        "alerts_suppressed_total",
    ] {
        assert!(body.contains(name), "Expected {} metric", name);
    }
}

#[tokio::test]
async fn start_session_returns_summary() {
    let app = TestApiServer::with_symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    let response = app
        .server
        .post("/api/sessions/42")
        .json(&json!({ "threshold": 3.5, "timeframe": "5m" }))
        .await;
    assert_eq!(response.status_code(), 201);

    let body: Value = response.json();
    assert_eq!(body["consumer_id"], 42);
    assert_eq!(body["instruments"], 3);
    assert_eq!(body["streams"], 2);
    assert_eq!(body["timeframe"], "5m");
    assert_eq!(body["scope"], "all_active");
    assert_eq!(body["category"], "linear");

    let handles = within(app.engine.connector.wait_for_connections(2)).await;
    let sent = within(handles[0].wait_for_sent(1)).await;
    assert!(sent[0].contains("kline.5."));

    app.engine.supervisor.shutdown().await;
}

#[tokio::test]
async fn list_sessions_shows_active_consumers() {
    let app = TestApiServer::with_symbols(&["BTCUSDT"]);

    let empty: Value = app.server.get("/api/sessions").await.json();
    assert_eq!(empty, json!([]));

    app.server
        .post("/api/sessions/9")
        .json(&json!({ "threshold": 2.0, "category": "spot" }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
    app.server
        .post("/api/sessions/3")
        .json(&json!({ "threshold": 4.0 }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let body: Value = app.server.get("/api/sessions").await.json();
    let sessions = body.as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["consumer_id"], 3);
    assert_eq!(sessions[0]["timeframe"], "15m");
    assert_eq!(sessions[1]["consumer_id"], 9);
    assert_eq!(sessions[1]["category"], "spot");

    app.engine.supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_session_then_stop_again() {
    let app = TestApiServer::with_symbols(&["BTCUSDT"]);

    app.server
        .post("/api/sessions/5")
        .json(&json!({ "threshold": 5.0 }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let response = app.server.delete("/api/sessions/5").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body, json!({ "stopped": true, "streams": 1 }));

    let response = app.server.delete("/api/sessions/5").await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["stopped"], false);
}

#[tokio::test]
async fn invalid_threshold_is_rejected() {
    let app = TestApiServer::with_symbols(&["BTCUSDT"]);

    for threshold in [0.0, -1.0, 150.0] {
        let response = app
            .server
            .post("/api/sessions/5")
            .json(&json!({ "threshold": threshold }))
            .await;
        assert_eq!(response.status_code(), 400);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("threshold"));
    }
    assert_eq!(app.engine.connector.connect_attempts(), 0);
}

#[tokio::test]
async fn empty_catalog_is_unprocessable() {
    let app = TestApiServer::with_symbols(&[]);

    let response = app
        .server
        .post("/api/sessions/5")
        .json(&json!({ "threshold": 5.0 }))
        .await;
    assert_eq!(response.status_code(), 422);
    let body: Value = response.json();
    assert_eq!(body["error"], "Failed to fetch instruments");
    assert!(body["detail"].as_str().is_some());
}

#[tokio::test]
async fn request_counter_tracks_api_calls() {
    let app = TestApiServer::with_symbols(&[]);

    app.server.get("/health").await;
    app.server.get("/api/sessions").await;

    assert!(app.engine.metrics.http_requests_total.get() >= 2);
}
