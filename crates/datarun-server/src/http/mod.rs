//! HTTP server for the dispatch backend.
//!
//! Provides endpoints for:
//! - Dashboard task API (`/task`, `/tasks/all`, `/result/{id}`)
//! - Runner protocol (`/register`, `/heartbeat`, `/tasks`, `/result`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod error;
mod handlers;

pub use error::ApiError;

/// Paths advertised by `GET /`.
pub const ENDPOINTS: &[&str] = &[
    "POST /task",
    "GET /tasks/all",
    "GET /task/{task_id}",
    "GET /result/{task_id}",
    "POST /register",
    "POST /heartbeat",
    "GET /tasks?runner_id=",
    "POST /task/{task_id}/start",
    "POST /result",
    "GET /runners",
    "GET /health",
    "GET /metrics",
];

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // The dashboard is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Dashboard routes
        .route("/task", post(handlers::create_task))
        .route("/tasks/all", get(handlers::list_tasks))
        .route("/task/:task_id", get(handlers::get_task))
        .route("/result/:task_id", get(handlers::get_result))
        // Runner routes
        .route("/register", post(handlers::register_runner))
        .route("/heartbeat", post(handlers::heartbeat))
        .route("/tasks", get(handlers::poll_task))
        .route("/task/:task_id/start", post(handlers::start_task))
        .route("/result", post(handlers::submit_result))
        .route("/runners", get(handlers::list_runners))
        // Observability routes
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
