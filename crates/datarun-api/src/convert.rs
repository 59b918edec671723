//! Converters between wire types and domain types.

use serde_json::Value;

use datarun_core::{Task, TaskOutcome, TaskStatus};

use crate::types::{
    AssignmentResponse, ResultResponse, ResultStatus, SubmitResultRequest, TaskDetailResponse,
    TaskSummary,
};

// ============================================================================
// Task conversions
// ============================================================================

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.as_str().to_string(),
            operation_code: task.operation_code,
            status: task.status,
            created_at: task.created_at,
            assigned_to: task.assigned_to.as_ref().map(|r| r.as_str().to_string()),
            result: task.result.clone(),
            error: task.error.clone(),
            completed_at: task.finished_at,
        }
    }
}

impl From<&Task> for TaskDetailResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.as_str().to_string(),
            operation_code: task.operation_code,
            params: task.params.clone(),
            status: task.status,
            created_at: task.created_at,
            assigned_to: task.assigned_to.as_ref().map(|r| r.as_str().to_string()),
            assigned_at: task.assigned_at,
            started_at: task.started_at,
            finished_at: task.finished_at,
            attempts: task.attempts,
            result: task.result.clone(),
            error: task.error.clone(),
        }
    }
}

impl From<&Task> for AssignmentResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.as_str().to_string(),
            operation_code: task.operation_code,
            params: task.params.clone(),
        }
    }
}

impl From<&Task> for ResultResponse {
    fn from(task: &Task) -> Self {
        let message = match task.status {
            TaskStatus::Completed | TaskStatus::Failed => None,
            _ => Some("Task result not available yet".to_string()),
        };
        Self {
            task_id: task.id.as_str().to_string(),
            status: task.status,
            runner_id: task.assigned_to.as_ref().map(|r| r.as_str().to_string()),
            result_data: task.result.clone(),
            error: task.error.clone(),
            message,
        }
    }
}

// ============================================================================
// Result submission
// ============================================================================

impl SubmitResultRequest {
    /// Interpret the submission as a domain outcome.
    ///
    /// A failure without an explicit `error` falls back to a string
    /// `result_data`, then to a generic message.
    pub fn outcome(&self) -> TaskOutcome {
        match self.status {
            ResultStatus::Completed => TaskOutcome::Completed(self.result_data.clone()),
            ResultStatus::Failed => {
                let message = self
                    .error
                    .clone()
                    .or_else(|| match &self.result_data {
                        Value::String(s) if !s.is_empty() => Some(s.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| "runner reported failure".to_string());
                TaskOutcome::Failed(message)
            }
        }
    }
}
