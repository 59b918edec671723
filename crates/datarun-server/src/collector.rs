//! Result collector - finalizes tasks from runner submissions.

use std::sync::Arc;

use tracing::{info, warn};

use datarun_core::{CoreError, RunnerId, Task, TaskId, TaskOutcome, TaskStatus};

use crate::registry::RunnerRegistry;
use crate::store::{TaskPatch, TaskStore};

/// Accepts results from runners and moves tasks to a terminal state.
pub struct ResultCollector {
    store: Arc<TaskStore>,
    registry: Arc<RunnerRegistry>,
}

impl ResultCollector {
    /// Create a new ResultCollector.
    pub fn new(store: Arc<TaskStore>, registry: Arc<RunnerRegistry>) -> Self {
        Self { store, registry }
    }

    /// Record the outcome of `task_id` reported by `runner_id`.
    ///
    /// Submissions from a runner that does not hold the task are discarded
    /// with a conflict and leave the task untouched.
    pub async fn submit_result(
        &self,
        task_id: &TaskId,
        runner_id: &RunnerId,
        outcome: TaskOutcome,
    ) -> Result<Task, CoreError> {
        let task = self.store.get(task_id).await?;

        if task.assigned_to.as_ref() != Some(runner_id) {
            let holder = task
                .assigned_to
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "nobody".to_string());
            warn!(
                task_id = %task_id,
                runner_id = %runner_id,
                assigned_to = %holder,
                "Discarding result from runner that does not hold the task"
            );
            return Err(CoreError::conflict(
                task_id,
                format!("result from {runner_id} but task is assigned to {holder}"),
            ));
        }

        // Runners may report without acknowledging first.
        if task.status == TaskStatus::Assigned {
            match self
                .store
                .update_status(
                    task_id,
                    TaskStatus::Assigned,
                    TaskStatus::Running,
                    TaskPatch::none().owned_by(runner_id.clone()),
                )
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {}
                Err(e) => return Err(e),
            }
        }

        let next = outcome.status();
        let finished = self
            .store
            .update_status(
                task_id,
                TaskStatus::Running,
                next,
                TaskPatch::none()
                    .owned_by(runner_id.clone())
                    .with_outcome(outcome),
            )
            .await
            .map_err(|e| {
                warn!(task_id = %task_id, runner_id = %runner_id, error = %e, "Result rejected");
                e
            })?;

        self.registry.clear_assignment(runner_id, task_id).await;
        // The submission proves the runner is alive; it may have been purged.
        match self.registry.heartbeat(runner_id).await {
            Ok(_) | Err(CoreError::RunnerNotFound(_)) => {}
            Err(e) => {
                warn!(runner_id = %runner_id, error = %e, "Heartbeat on result failed");
            }
        }

        info!(
            task_id = %task_id,
            runner_id = %runner_id,
            status = %next,
            "Task finished"
        );
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datarun_core::RunnerInfo;
    use serde_json::json;

    use crate::coordinator::AssignmentCoordinator;
    use crate::queue::DispatchQueue;

    struct Harness {
        store: Arc<TaskStore>,
        registry: Arc<RunnerRegistry>,
        coordinator: AssignmentCoordinator,
        collector: ResultCollector,
    }

    fn harness() -> Harness {
        let store = Arc::new(TaskStore::new());
        let queue = Arc::new(DispatchQueue::new());
        let registry = Arc::new(RunnerRegistry::new());
        Harness {
            coordinator: AssignmentCoordinator::new(store.clone(), queue, registry.clone()),
            collector: ResultCollector::new(store.clone(), registry.clone()),
            store,
            registry,
        }
    }

    async fn assigned_task(h: &Harness, runner: &str) -> (TaskId, RunnerId) {
        let task_id = h.coordinator.submit_task(300, json!({"dataset": "x"})).await.unwrap();
        let runner_id = h
            .coordinator
            .register_runner(RunnerInfo::new(RunnerId::new(runner), runner))
            .await
            .unwrap();
        h.coordinator.poll(&runner_id).await.unwrap().unwrap();
        (task_id, runner_id)
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let h = harness();
        let (task_id, r1) = assigned_task(&h, "R1").await;
        h.coordinator.acknowledge(&task_id, &r1).await.unwrap();

        let task = h
            .collector
            .submit_result(&task_id, &r1, TaskOutcome::Completed(json!({"score": 0.91})))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(json!({"score": 0.91})));
        assert_eq!(task.assigned_to, Some(r1));
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_result_without_ack_is_accepted() {
        let h = harness();
        let (task_id, r1) = assigned_task(&h, "R1").await;

        let task = h
            .collector
            .submit_result(&task_id, &r1, TaskOutcome::Failed("no such dataset".into()))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("no such dataset"));
        assert!(task.started_at.is_some());
    }

    #[tokio::test]
    async fn test_result_from_wrong_runner_leaves_task_unchanged() {
        let h = harness();
        let (task_id, r1) = assigned_task(&h, "R1").await;
        h.coordinator.acknowledge(&task_id, &r1).await.unwrap();
        let before = h.store.get(&task_id).await.unwrap();

        let err = h
            .collector
            .submit_result(&task_id, &RunnerId::new("R9"), TaskOutcome::Completed(json!(1)))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(h.store.get(&task_id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let h = harness();
        let (task_id, r1) = assigned_task(&h, "R1").await;
        h.collector
            .submit_result(&task_id, &r1, TaskOutcome::Completed(json!("first")))
            .await
            .unwrap();

        let err = h
            .collector
            .submit_result(&task_id, &r1, TaskOutcome::Completed(json!("second")))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(h.store.get(&task_id).await.unwrap().result, Some(json!("first")));
    }

    #[tokio::test]
    async fn test_unknown_task_not_found() {
        let h = harness();
        let err = h
            .collector
            .submit_result(&TaskId::new("nope"), &RunnerId::new("R1"), TaskOutcome::Completed(json!(null)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_late_result_after_release_rejected() {
        let h = harness();
        let (task_id, r1) = assigned_task(&h, "R1").await;
        h.coordinator.acknowledge(&task_id, &r1).await.unwrap();
        assert!(h.coordinator.release(&r1, &task_id).await.unwrap());

        let err = h
            .collector
            .submit_result(&task_id, &r1, TaskOutcome::Completed(json!("late")))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let task = h.store.get(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_result_from_purged_runner_is_recorded() {
        let h = harness();
        let (task_id, r1) = assigned_task(&h, "R1").await;

        let later = chrono::Utc::now() + chrono::Duration::seconds(120);
        h.registry.sweep_dead_at(chrono::Duration::seconds(45), later).await;
        assert_eq!(
            h.registry.purge_at(chrono::Duration::seconds(10), later).await,
            vec![r1.clone()]
        );

        let task = h
            .collector
            .submit_result(&task_id, &r1, TaskOutcome::Completed(json!({})))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(matches!(
            h.registry.get(&r1).await,
            Err(CoreError::RunnerNotFound(_))
        ));
    }
}
