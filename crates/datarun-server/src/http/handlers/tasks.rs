//! Dashboard task handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{Map, Value};

use datarun_api::{
    CreateTaskRequest, CreateTaskResponse, TaskDetailResponse, TaskListResponse, TaskSummary,
};
use datarun_core::TaskId;

use crate::http::ApiError;
use crate::state::AppState;

/// Create a task and queue it for dispatch.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Json<CreateTaskResponse>, ApiError> {
    let Json(req) = payload?;

    state.auth.verify(req.api_key.as_deref())?;

    // PHP clients encode an empty associative array as `[]`.
    let params = match req.params {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::Array(items)) if items.is_empty() => Value::Object(Map::new()),
        Some(params) => params,
    };

    let task_id = state
        .coordinator
        .submit_task(req.operation_code, params)
        .await?;

    Ok(Json(CreateTaskResponse {
        task_id: task_id.into_inner(),
        message: "Task created".to_string(),
    }))
}

/// List every task in creation order.
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<TaskListResponse> {
    let tasks = state.store.list_all().await;
    Json(TaskListResponse {
        tasks: tasks.iter().map(TaskSummary::from).collect(),
    })
}

/// Full record of one task.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskDetailResponse>, ApiError> {
    let task = state.store.get(&TaskId::new(task_id)).await?;
    Ok(Json(TaskDetailResponse::from(&task)))
}
