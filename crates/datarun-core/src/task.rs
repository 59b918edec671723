//! Task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{OperationCode, RunnerId, TaskId, TaskStatus};

/// A Task is one unit of work submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Which operation the runner should perform.
    pub operation_code: OperationCode,

    /// Operation parameters as submitted.
    pub params: Map<String, Value>,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// Runner currently (or last) holding the task.
    pub assigned_to: Option<RunnerId>,

    /// Result document on success.
    pub result: Option<Value>,

    /// Error message on failure.
    pub error: Option<String>,

    /// When the current assignment was made.
    pub assigned_at: Option<DateTime<Utc>>,

    /// When the runner acknowledged the current assignment.
    pub started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of times the task has been assigned, including re-deliveries.
    pub attempts: u32,
}

impl Task {
    /// Create a new pending Task.
    pub fn new(operation_code: OperationCode, params: Map<String, Value>) -> Self {
        Self {
            id: TaskId::generate(),
            operation_code,
            params,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            assigned_to: None,
            result: None,
            error: None,
            assigned_at: None,
            started_at: None,
            finished_at: None,
            attempts: 0,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check whether `runner_id` currently holds this task.
    pub fn is_held_by(&self, runner_id: &RunnerId) -> bool {
        self.status.is_held() && self.assigned_to.as_ref() == Some(runner_id)
    }

    /// Move to `next`, stamping the bookkeeping fields that belong to it.
    ///
    /// Callers are responsible for checking the edge is allowed.
    pub fn enter(&mut self, next: TaskStatus) {
        let now = Utc::now();
        match next {
            TaskStatus::Pending => {
                self.assigned_to = None;
                self.assigned_at = None;
                self.started_at = None;
            }
            TaskStatus::Assigned => {
                self.assigned_at = Some(now);
                self.attempts += 1;
            }
            TaskStatus::Running => {
                self.started_at = Some(now);
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                self.finished_at = Some(now);
            }
        }
        self.status = next;
    }

    /// Store a runner's outcome.
    pub fn record_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed(result) => {
                self.result = Some(result);
                self.error = None;
            }
            TaskOutcome::Failed(error) => {
                self.result = None;
                self.error = Some(error);
            }
        }
    }
}

/// What a runner reports when it finishes a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Successful execution with a result document.
    Completed(Value),
    /// Failed execution with an error message.
    Failed(String),
}

impl TaskOutcome {
    /// Terminal status this outcome leads to.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Completed(_) => TaskStatus::Completed,
            Self::Failed(_) => TaskStatus::Failed,
        }
    }
}
