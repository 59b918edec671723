//! Core domain errors.

use thiserror::Error;

use crate::{RunnerId, TaskId, TaskStatus};

/// Core domain errors for datarun.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed operation code or params, rejected before persistence.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A compare-and-swap lost against the current stored state.
    #[error("Conflict on task {task_id}: {reason}")]
    Conflict { task_id: TaskId, reason: String },

    /// Task not found.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Runner not found.
    #[error("Runner not found: {0}")]
    RunnerNotFound(RunnerId),

    /// Requested status change is not an allowed edge.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    /// Missing or mismatched api key.
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl CoreError {
    /// Shorthand for building a conflict error.
    pub fn conflict(task_id: &TaskId, reason: impl Into<String>) -> Self {
        Self::Conflict {
            task_id: task_id.clone(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error is a lost compare-and-swap.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
