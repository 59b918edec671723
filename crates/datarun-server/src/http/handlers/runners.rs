//! Runner protocol handlers.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};

use datarun_api::{
    AssignmentResponse, HeartbeatResponse, PollQuery, PollResponse, RegisterRunnerRequest,
    RegisterRunnerResponse, RunnerListResponse, RunnerRef, RunnerSummary, StartTaskResponse,
};
use datarun_core::{CapabilitySet, RunnerId, RunnerInfo, TaskId};

use crate::http::ApiError;
use crate::registry::RunnerRecord;
use crate::state::AppState;

/// Register (or re-register) a runner.
pub async fn register_runner(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRunnerRequest>, JsonRejection>,
) -> Result<Json<RegisterRunnerResponse>, ApiError> {
    let Json(req) = payload?;

    let runner_id = req
        .runner_id
        .filter(|id| !id.is_empty())
        .map(RunnerId::new)
        .unwrap_or_else(RunnerId::generate);
    let name = req.name.unwrap_or_else(|| runner_id.to_string());
    let capabilities = CapabilitySet::from_codes(&req.capabilities)?;

    let info = RunnerInfo::new(runner_id, name).with_capabilities(capabilities);
    let runner_id = state.coordinator.register_runner(info).await?;

    Ok(Json(RegisterRunnerResponse {
        runner_id: runner_id.into_inner(),
        message: "Runner registered".to_string(),
    }))
}

/// Refresh a runner's liveness.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunnerRef>, JsonRejection>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let Json(req) = payload?;
    let runner_id = RunnerId::new(req.runner_id);
    let status = state.coordinator.heartbeat(&runner_id).await?;

    Ok(Json(HeartbeatResponse {
        runner_id: runner_id.into_inner(),
        status,
    }))
}

/// Hand the polling runner at most one task.
pub async fn poll_task(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Result<Json<PollResponse>, ApiError> {
    let Query(query) = query?;
    let runner_id = RunnerId::new(query.runner_id);

    let response = match state.coordinator.poll(&runner_id).await? {
        Some(task) => PollResponse::Task(AssignmentResponse::from(&task)),
        None => PollResponse::empty(),
    };
    Ok(Json(response))
}

/// Runner acknowledges it started executing a task.
pub async fn start_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    payload: Result<Json<RunnerRef>, JsonRejection>,
) -> Result<Json<StartTaskResponse>, ApiError> {
    let Json(req) = payload?;
    let task = state
        .coordinator
        .acknowledge(&TaskId::new(task_id), &RunnerId::new(req.runner_id))
        .await?;

    Ok(Json(StartTaskResponse {
        task_id: task.id.into_inner(),
        status: task.status,
    }))
}

/// Every known runner, ordered by id.
pub async fn list_runners(State(state): State<Arc<AppState>>) -> Json<RunnerListResponse> {
    let runners = state.registry.list().await;
    Json(RunnerListResponse {
        runners: runners.iter().map(to_summary).collect(),
    })
}

fn to_summary(record: &RunnerRecord) -> RunnerSummary {
    RunnerSummary {
        runner_id: record.info.runner_id.to_string(),
        name: record.info.name.clone(),
        capabilities: record.info.capabilities.codes(),
        status: record.liveness,
        registered_at: record.registered_at,
        last_heartbeat: record.last_heartbeat,
        current_task: record.current_task.as_ref().map(|t| t.to_string()),
    }
}
