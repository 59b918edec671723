//! Result handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use datarun_api::{MessageResponse, ResultResponse, SubmitResultRequest};
use datarun_core::{RunnerId, TaskId};

use crate::http::ApiError;
use crate::state::AppState;

/// Current result of a task; not-yet-finished tasks carry a message instead.
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let task = state.store.get(&TaskId::new(task_id)).await?;
    Ok(Json(ResultResponse::from(&task)))
}

/// A runner reports the outcome of its task.
pub async fn submit_result(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitResultRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let outcome = req.outcome();

    let task = state
        .collector
        .submit_result(
            &TaskId::new(req.task_id),
            &RunnerId::new(req.runner_id),
            outcome,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Result recorded, task {}", task.status),
    }))
}
