//! Status enums for Tasks and Runners.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a Task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task stored and queued, waiting for a runner.
    #[default]
    Pending,
    /// Task claimed by a runner, awaiting acknowledgment.
    Assigned,
    /// Runner acknowledged and is executing the task.
    Running,
    /// Task finished successfully.
    Completed,
    /// Task finished with an error.
    Failed,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true while a runner holds the task.
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Assigned | Self::Running)
    }

    /// Returns true if `self -> next` is an allowed edge.
    ///
    /// Forward edges follow pending -> assigned -> running -> {completed | failed}.
    /// The only backward edges are releases of a held task to pending, which
    /// happen when its runner is declared dead.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Assigned, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Assigned, Pending)
                | (Running, Pending)
        )
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Liveness of a registered Runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerLiveness {
    /// Runner heartbeated within the liveness window.
    #[default]
    Active,
    /// Runner missed the liveness window; kept until the retention window ends.
    Expired,
}

impl RunnerLiveness {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RunnerLiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_edges_allowed() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Assigned));
        assert!(TaskStatus::Assigned.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn test_release_edges_allowed() {
        assert!(TaskStatus::Assigned.can_transition_to(TaskStatus::Pending));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in TaskStatus::ALL {
            assert!(!TaskStatus::Completed.can_transition_to(next));
            assert!(!TaskStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_skipping_states_rejected() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Assigned.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
    }
}
