//! HTTP request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use datarun_core::{OperationCode, RunnerLiveness, TaskStatus};

// ============================================================================
// Dashboard types
// ============================================================================

/// Body of `POST /task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Raw operation code; validated server-side.
    pub operation_code: i64,

    /// Operation parameters. Missing or null means an empty object.
    #[serde(default)]
    pub params: Option<Value>,

    /// Shared api key, if the server requires one.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Response of `POST /task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub message: String,
}

/// One entry of `GET /tasks/all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub operation_code: OperationCode,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Response of `GET /tasks/all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskSummary>,
}

/// Response of `GET /result/{task_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub runner_id: Option<String>,
    pub result_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response of `GET /task/{task_id}`: the full stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetailResponse {
    pub task_id: String,
    pub operation_code: OperationCode,
    pub params: Map<String, Value>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_to: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub result: Option<Value>,
    pub error: Option<String>,
}

// ============================================================================
// Runner types
// ============================================================================

/// Body of `POST /register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRunnerRequest {
    /// Runner-chosen id; generated when absent.
    #[serde(default)]
    pub runner_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// Operation codes the runner executes. Empty means all.
    #[serde(default)]
    pub capabilities: Vec<i64>,
}

/// Response of `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRunnerResponse {
    pub runner_id: String,
    pub message: String,
}

/// Body of `POST /heartbeat` and `POST /task/{task_id}/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerRef {
    pub runner_id: String,
}

/// Response of `POST /heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub runner_id: String,
    pub status: RunnerLiveness,
}

/// Query of `GET /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollQuery {
    pub runner_id: String,
}

/// A task handed to a runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResponse {
    pub task_id: String,
    pub operation_code: OperationCode,
    pub params: Map<String, Value>,
}

/// Response of `GET /tasks` when nothing is queued for the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyPollResponse {
    pub message: String,
}

/// Response of `GET /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PollResponse {
    Task(AssignmentResponse),
    Empty(EmptyPollResponse),
}

impl PollResponse {
    /// The message returned when no task is available.
    pub const NO_TASKS: &'static str = "No tasks available";

    pub fn empty() -> Self {
        Self::Empty(EmptyPollResponse {
            message: Self::NO_TASKS.to_string(),
        })
    }

    /// Take the assignment, if any.
    pub fn into_assignment(self) -> Option<AssignmentResponse> {
        match self {
            Self::Task(a) => Some(a),
            Self::Empty(_) => None,
        }
    }
}

/// Response of `POST /task/{task_id}/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

/// Final status a runner reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Completed,
    Failed,
}

/// Body of `POST /result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResultRequest {
    pub task_id: String,
    pub runner_id: String,
    #[serde(default)]
    pub result_data: Value,
    #[serde(default)]
    pub status: ResultStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of `POST /result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// One entry of `GET /runners`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSummary {
    pub runner_id: String,
    pub name: String,
    pub capabilities: Vec<i64>,
    pub status: RunnerLiveness,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub current_task: Option<String>,
}

/// Response of `GET /runners`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerListResponse {
    pub runners: Vec<RunnerSummary>,
}

// ============================================================================
// Service types
// ============================================================================

/// Response of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
