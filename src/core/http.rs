//! HTTP control plane using Axum

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::core::supervisor::{MonitoringSupervisor, StopOutcome};
use crate::metrics::Metrics;
use crate::models::{MarketCategory, MonitoringRequest, WatchScope, DEFAULT_TIMEFRAME};
use crate::ConsumerId;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub supervisor: Arc<MonitoringSupervisor>,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
    pub reason: Option<String>,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            reason: None,
        }
    }
}

impl HealthStatus {
    /// Serving, but with a dependency unavailable.
    pub fn degrade(&mut self, reason: impl Into<String>) {
        self.status = "degraded".to_string();
        self.reason = Some(reason.into());
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let mut body = json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "pulsewatch"
    });
    if let Some(reason) = &health.reason {
        body["reason"] = json!(reason);
    }
    Ok(Json(body))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub threshold: f64,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub scope: Option<WatchScope>,
    #[serde(default)]
    pub category: Option<MarketCategory>,
}

/// List active monitoring sessions
async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.supervisor.active_sessions().await))
}

/// Start (or replace) a consumer's monitoring session
async fn start_session(
    State(state): State<AppState>,
    Path(consumer_id): Path<ConsumerId>,
    Json(body): Json<StartSessionRequest>,
) -> Response {
    let request = match MonitoringRequest::new(
        consumer_id,
        body.threshold,
        body.timeframe.unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string()),
        body.scope.unwrap_or_default(),
        body.category.unwrap_or_default(),
    ) {
        Ok(request) => request,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                .into_response()
        }
    };

    match state.supervisor.start(request).await {
        Ok(summary) => (StatusCode::CREATED, Json(json!(summary))).into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.user_message(), "detail": e.to_string() })),
        )
            .into_response(),
    }
}

/// Stop a consumer's monitoring session
async fn stop_session(
    State(state): State<AppState>,
    Path(consumer_id): Path<ConsumerId>,
) -> Response {
    match state.supervisor.stop(consumer_id).await {
        StopOutcome::Stopped { streams } => (
            StatusCode::OK,
            Json(json!({ "stopped": true, "streams": streams })),
        )
            .into_response(),
        StopOutcome::NoActiveSession => {
            (StatusCode::NOT_FOUND, Json(json!({ "stopped": false }))).into_response()
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/sessions", get(list_sessions))
        .route(
            "/api/sessions/{consumer_id}",
            axum::routing::post(start_session).delete(stop_session),
        )
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve the control plane until `shutdown` resolves.
pub async fn start_server<F>(
    state: AppState,
    port: u16,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!("Metrics endpoint available at http://0.0.0.0:{}/metrics", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
