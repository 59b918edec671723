//! Client for the dashboard side of the API.

use serde_json::Value;

use datarun_api::{
    CreateTaskRequest, CreateTaskResponse, ResultResponse, RunnerListResponse, RunnerSummary,
    TaskDetailResponse, TaskListResponse, TaskSummary,
};
use datarun_core::{OperationCode, TaskId};

use crate::error::ClientError;
use crate::http::{ClientConfig, HttpClient};

/// Submits tasks and reads their state.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: HttpClient,
    api_key: Option<String>,
}

impl DashboardClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpClient::new(config)?,
            api_key: config.api_key.clone(),
        })
    }

    /// Create a task. Returns its id.
    pub async fn submit_task(
        &self,
        operation_code: OperationCode,
        params: Value,
    ) -> Result<TaskId, ClientError> {
        let request = CreateTaskRequest {
            operation_code: operation_code.as_i64(),
            params: Some(params),
            api_key: self.api_key.clone(),
        };
        let response: CreateTaskResponse = self.http.post_json("/task", &request).await?;
        Ok(TaskId::new(response.task_id))
    }

    /// Every task in creation order.
    pub async fn list_tasks(&self) -> Result<Vec<TaskSummary>, ClientError> {
        let response: TaskListResponse = self.http.get_json("/tasks/all").await?;
        Ok(response.tasks)
    }

    /// Result view of a task.
    pub async fn get_result(&self, task_id: &TaskId) -> Result<ResultResponse, ClientError> {
        self.http.get_json(&format!("/result/{task_id}")).await
    }

    /// Full record of a task.
    pub async fn get_task(&self, task_id: &TaskId) -> Result<TaskDetailResponse, ClientError> {
        self.http.get_json(&format!("/task/{task_id}")).await
    }

    /// Every known runner.
    pub async fn list_runners(&self) -> Result<Vec<RunnerSummary>, ClientError> {
        let response: RunnerListResponse = self.http.get_json("/runners").await?;
        Ok(response.runners)
    }

    /// Check if the server is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        self.http.health().await
    }
}
