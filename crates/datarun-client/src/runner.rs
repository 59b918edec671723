//! Client for the runner side of the API.

use serde_json::Value;
use tracing::debug;

use datarun_api::{
    AssignmentResponse, HeartbeatResponse, MessageResponse, PollResponse, RegisterRunnerRequest,
    RegisterRunnerResponse, ResultStatus, RunnerRef, StartTaskResponse, SubmitResultRequest,
};
use datarun_core::{CapabilitySet, RunnerId, RunnerLiveness, TaskId, TaskOutcome};

use crate::error::ClientError;
use crate::http::{ClientConfig, HttpClient};

/// Registers a runner and drives the poll / start / result exchange.
#[derive(Debug, Clone)]
pub struct RunnerClient {
    http: HttpClient,
}

impl RunnerClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    /// Register with the server. A `None` id lets the server pick one.
    pub async fn register(
        &self,
        runner_id: Option<&RunnerId>,
        name: Option<&str>,
        capabilities: &CapabilitySet,
    ) -> Result<RunnerId, ClientError> {
        let request = RegisterRunnerRequest {
            runner_id: runner_id.map(|r| r.to_string()),
            name: name.map(str::to_string),
            capabilities: capabilities.codes(),
        };
        let response: RegisterRunnerResponse = self.http.post_json("/register", &request).await?;
        Ok(RunnerId::new(response.runner_id))
    }

    /// Refresh liveness.
    pub async fn heartbeat(&self, runner_id: &RunnerId) -> Result<RunnerLiveness, ClientError> {
        let request = RunnerRef {
            runner_id: runner_id.to_string(),
        };
        let response: HeartbeatResponse = self.http.post_json("/heartbeat", &request).await?;
        Ok(response.status)
    }

    /// Ask for work. `None` means nothing is queued for this runner.
    pub async fn poll(&self, runner_id: &RunnerId) -> Result<Option<AssignmentResponse>, ClientError> {
        let response: PollResponse = self
            .http
            .get_json_with_query("/tasks", &[("runner_id", runner_id.as_str())])
            .await?;
        let assignment = response.into_assignment();
        if assignment.is_none() {
            debug!(runner_id = %runner_id, "No tasks available");
        }
        Ok(assignment)
    }

    /// Acknowledge that execution has begun.
    pub async fn start(
        &self,
        task_id: &TaskId,
        runner_id: &RunnerId,
    ) -> Result<StartTaskResponse, ClientError> {
        let request = RunnerRef {
            runner_id: runner_id.to_string(),
        };
        self.http
            .post_json(&format!("/task/{task_id}/start"), &request)
            .await
    }

    /// Report the outcome of a task.
    pub async fn submit_result(
        &self,
        task_id: &TaskId,
        runner_id: &RunnerId,
        outcome: TaskOutcome,
    ) -> Result<String, ClientError> {
        let request = match outcome {
            TaskOutcome::Completed(data) => SubmitResultRequest {
                task_id: task_id.to_string(),
                runner_id: runner_id.to_string(),
                result_data: data,
                status: ResultStatus::Completed,
                error: None,
            },
            TaskOutcome::Failed(error) => SubmitResultRequest {
                task_id: task_id.to_string(),
                runner_id: runner_id.to_string(),
                result_data: Value::Null,
                status: ResultStatus::Failed,
                error: Some(error),
            },
        };
        let response: MessageResponse = self.http.post_json("/result", &request).await?;
        Ok(response.message)
    }
}
