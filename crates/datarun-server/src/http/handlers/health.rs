//! Health, service info and metrics handlers.

use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, Json};

use datarun_api::ServiceInfo;

use crate::http::ENDPOINTS;
use crate::state::AppState;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();
    Json(serde_json::json!({ "status": "ok", "uptime_secs": uptime }))
}

/// Service banner listing the available endpoints.
pub async fn service_info() -> impl IntoResponse {
    Json(ServiceInfo {
        message: "datarun dispatch server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = crate::metrics::collect_metrics(&state).await;
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
