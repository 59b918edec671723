//! Assignment coordinator - routes queued tasks to polling runners.
//!
//! The dispatch queue proposes candidates; the task store's compare-and-swap
//! decides who actually gets a task. A candidate whose CAS fails was claimed
//! (or released) through another path and is simply skipped.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use datarun_core::{CoreError, RunnerId, RunnerInfo, RunnerLiveness, Task, TaskId, TaskStatus};

use crate::queue::DispatchQueue;
use crate::registry::RunnerRegistry;
use crate::store::{TaskPatch, TaskStore};

/// What a sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Runners that missed their liveness window.
    pub expired: Vec<RunnerId>,
    /// Tasks put back into the queue.
    pub requeued: Vec<TaskId>,
    /// Runners removed after the retention window.
    pub purged: Vec<RunnerId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.requeued.is_empty() && self.purged.is_empty()
    }
}

/// Matches pending tasks to runners.
pub struct AssignmentCoordinator {
    store: Arc<TaskStore>,
    queue: Arc<DispatchQueue>,
    registry: Arc<RunnerRegistry>,
}

impl AssignmentCoordinator {
    /// Create a new AssignmentCoordinator.
    pub fn new(
        store: Arc<TaskStore>,
        queue: Arc<DispatchQueue>,
        registry: Arc<RunnerRegistry>,
    ) -> Self {
        Self {
            store,
            queue,
            registry,
        }
    }

    /// Persist a new task and queue it for dispatch.
    pub async fn submit_task(&self, operation_code: i64, params: Value) -> Result<TaskId, CoreError> {
        let task_id = self.store.create(operation_code, params).await?;
        self.enqueue(&task_id).await?;
        info!(task_id = %task_id, operation_code, "Task submitted");
        Ok(task_id)
    }

    async fn enqueue(&self, task_id: &TaskId) -> Result<(), CoreError> {
        let entry = self.store.queue_entry(task_id).await?;
        if !self.queue.enqueue(entry).await {
            debug!(task_id = %task_id, "Task already queued");
        }
        Ok(())
    }

    /// Register a runner, releasing anything it held under a prior registration.
    pub async fn register_runner(&self, info: RunnerInfo) -> Result<RunnerId, CoreError> {
        let runner_id = info.runner_id.clone();
        let codes = info.capabilities.codes();

        if let Some(previous) = self.registry.register(info).await {
            warn!(
                runner_id = %runner_id,
                task_id = %previous,
                "Runner re-registered while holding a task, releasing it"
            );
            self.release(&runner_id, &previous).await?;
        }

        info!(runner_id = %runner_id, capabilities = ?codes, "Runner registered");
        Ok(runner_id)
    }

    /// Refresh a runner's liveness.
    pub async fn heartbeat(&self, runner_id: &RunnerId) -> Result<RunnerLiveness, CoreError> {
        self.registry.heartbeat(runner_id).await
    }

    /// Hand the polling runner at most one task.
    ///
    /// Returns `Ok(None)` when nothing matching its capabilities is queued.
    /// A runner that already holds a task gets that task again.
    pub async fn poll(&self, runner_id: &RunnerId) -> Result<Option<Task>, CoreError> {
        self.registry.heartbeat(runner_id).await?;

        let record = self.registry.get(runner_id).await?;
        if let Some(current) = record.current_task {
            match self.store.get(&current).await {
                Ok(task) if task.is_held_by(runner_id) => return Ok(Some(task)),
                _ => {
                    self.registry.clear_assignment(runner_id, &current).await;
                }
            }
        }

        let capabilities = record.info.capabilities;
        loop {
            let Some(task_id) = self.queue.dequeue_for_capability(&capabilities).await else {
                return Ok(None);
            };

            let claimed = self
                .store
                .update_status(
                    &task_id,
                    TaskStatus::Pending,
                    TaskStatus::Assigned,
                    TaskPatch::assign(runner_id.clone()),
                )
                .await;

            match claimed {
                Ok(task) => {
                    if let Err(e) = self.registry.bind_assignment(runner_id, &task_id).await {
                        warn!(
                            runner_id = %runner_id,
                            task_id = %task_id,
                            error = %e,
                            "Could not bind claimed task, releasing it"
                        );
                        self.release(runner_id, &task_id).await?;
                        return match e {
                            CoreError::RunnerNotFound(_) => Err(e),
                            _ => Ok(None),
                        };
                    }

                    info!(
                        task_id = %task_id,
                        runner_id = %runner_id,
                        operation = task.operation_code.name(),
                        attempt = task.attempts,
                        "Task assigned to runner"
                    );
                    return Ok(Some(task));
                }
                Err(e) if e.is_conflict() => {
                    debug!(task_id = %task_id, error = %e, "Stale queue entry, trying next");
                }
                Err(CoreError::TaskNotFound(_)) => {
                    debug!(task_id = %task_id, "Queued task vanished, trying next");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runner acknowledges it started executing: `assigned -> running`.
    ///
    /// A repeated acknowledgment of a task already running on the same runner
    /// succeeds without changing anything.
    pub async fn acknowledge(&self, task_id: &TaskId, runner_id: &RunnerId) -> Result<Task, CoreError> {
        self.registry.heartbeat(runner_id).await?;

        let result = self
            .store
            .update_status(
                task_id,
                TaskStatus::Assigned,
                TaskStatus::Running,
                TaskPatch::none().owned_by(runner_id.clone()),
            )
            .await;

        match result {
            Ok(task) => {
                info!(task_id = %task_id, runner_id = %runner_id, "Runner started task");
                Ok(task)
            }
            Err(e) if e.is_conflict() => {
                let task = self.store.get(task_id).await?;
                if task.status == TaskStatus::Running && task.is_held_by(runner_id) {
                    Ok(task)
                } else {
                    warn!(task_id = %task_id, runner_id = %runner_id, error = %e, "Rejected start");
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Put a task held by `runner_id` back into the queue.
    ///
    /// Returns false if the runner no longer holds the task (it finished, or
    /// was already released).
    pub async fn release(&self, runner_id: &RunnerId, task_id: &TaskId) -> Result<bool, CoreError> {
        loop {
            let task = self.store.get(task_id).await?;
            if !task.is_held_by(runner_id) {
                return Ok(false);
            }

            let released = self
                .store
                .update_status(
                    task_id,
                    task.status,
                    TaskStatus::Pending,
                    TaskPatch::none().owned_by(runner_id.clone()),
                )
                .await;

            match released {
                Ok(_) => {
                    self.registry.clear_assignment(runner_id, task_id).await;
                    self.enqueue(task_id).await?;
                    info!(
                        task_id = %task_id,
                        runner_id = %runner_id,
                        from = %task.status,
                        "Task released back to pending"
                    );
                    return Ok(true);
                }
                // The task moved on under us; look again.
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Expire silent runners, requeue their work and purge long-gone runners.
    pub async fn sweep(&self, liveness_window: Duration, retention: Duration) -> SweepReport {
        self.sweep_at(liveness_window, retention, Utc::now()).await
    }

    /// [`Self::sweep`] evaluated at a given instant.
    pub async fn sweep_at(
        &self,
        liveness_window: Duration,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        for dead in self.registry.sweep_dead_at(liveness_window, now).await {
            warn!(runner_id = %dead.runner_id, "Runner missed liveness window");
            if let Some(task_id) = &dead.assignment {
                match self.release(&dead.runner_id, task_id).await {
                    Ok(true) => report.requeued.push(task_id.clone()),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(task_id = %task_id, error = %e, "Failed to release task of dead runner");
                    }
                }
            }
            report.expired.push(dead.runner_id);
        }

        report.purged = self.registry.purge_at(retention, now).await;
        for runner_id in &report.purged {
            info!(runner_id = %runner_id, "Runner removed after retention window");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datarun_core::{CapabilitySet, OperationCode};
    use serde_json::json;

    struct Harness {
        store: Arc<TaskStore>,
        queue: Arc<DispatchQueue>,
        registry: Arc<RunnerRegistry>,
        coordinator: AssignmentCoordinator,
    }

    fn harness() -> Harness {
        let store = Arc::new(TaskStore::new());
        let queue = Arc::new(DispatchQueue::new());
        let registry = Arc::new(RunnerRegistry::new());
        let coordinator = AssignmentCoordinator::new(store.clone(), queue.clone(), registry.clone());
        Harness {
            store,
            queue,
            registry,
            coordinator,
        }
    }

    async fn runner(h: &Harness, id: &str, codes: &[OperationCode]) -> RunnerId {
        let caps: CapabilitySet = codes.iter().copied().collect();
        let info = RunnerInfo::new(RunnerId::new(id), id).with_capabilities(caps);
        h.coordinator.register_runner(info).await.unwrap()
    }

    #[tokio::test]
    async fn test_poll_assigns_matching_task() {
        let h = harness();
        let task_id = h.coordinator.submit_task(300, json!({"dataset": "x"})).await.unwrap();
        let r1 = runner(&h, "R1", &[OperationCode::MlAnalysis]).await;

        let task = h.coordinator.poll(&r1).await.unwrap().unwrap();
        assert_eq!(task.id, task_id);
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_to, Some(r1.clone()));
        assert_eq!(
            h.registry.get(&r1).await.unwrap().current_task,
            Some(task_id)
        );
    }

    #[tokio::test]
    async fn test_poll_without_matching_capability_is_empty() {
        let h = harness();
        h.coordinator.submit_task(100, json!({})).await.unwrap();
        let r1 = runner(&h, "R1", &[OperationCode::ExportReport]).await;

        assert!(h.coordinator.poll(&r1).await.unwrap().is_none());
        assert_eq!(h.queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_poll_unknown_runner() {
        let h = harness();
        let err = h.coordinator.poll(&RunnerId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, CoreError::RunnerNotFound(_)));
    }

    #[tokio::test]
    async fn test_poll_is_idempotent_while_holding() {
        let h = harness();
        let first = h.coordinator.submit_task(200, json!({})).await.unwrap();
        h.coordinator.submit_task(200, json!({})).await.unwrap();
        let r1 = runner(&h, "R1", &[OperationCode::FilterData]).await;

        let a = h.coordinator.poll(&r1).await.unwrap().unwrap();
        let b = h.coordinator.poll(&r1).await.unwrap().unwrap();
        assert_eq!(a.id, first);
        assert_eq!(b.id, first);
        assert_eq!(h.queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_stale_queue_entry_is_skipped() {
        let h = harness();
        let stale = h.coordinator.submit_task(100, json!({})).await.unwrap();
        let fresh = h.coordinator.submit_task(100, json!({})).await.unwrap();

        // Claim the first task behind the queue's back.
        h.store
            .update_status(
                &stale,
                TaskStatus::Pending,
                TaskStatus::Assigned,
                TaskPatch::assign(RunnerId::new("other")),
            )
            .await
            .unwrap();

        let r1 = runner(&h, "R1", &[OperationCode::FetchRawData]).await;
        let task = h.coordinator.poll(&r1).await.unwrap().unwrap();
        assert_eq!(task.id, fresh);
    }

    #[tokio::test]
    async fn test_acknowledge_by_owner_only() {
        let h = harness();
        let task_id = h.coordinator.submit_task(300, json!({})).await.unwrap();
        let r1 = runner(&h, "R1", &[OperationCode::MlAnalysis]).await;
        let r2 = runner(&h, "R2", &[OperationCode::MlAnalysis]).await;
        h.coordinator.poll(&r1).await.unwrap();

        let err = h.coordinator.acknowledge(&task_id, &r2).await.unwrap_err();
        assert!(err.is_conflict());

        let task = h.coordinator.acknowledge(&task_id, &r1).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);

        // Repeated ack is harmless.
        let task = h.coordinator.acknowledge(&task_id, &r1).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_dead_runner_task_requeued_once_and_reclaimed() {
        let h = harness();
        let task_id = h.coordinator.submit_task(300, json!({"dataset": "x"})).await.unwrap();
        let r1 = runner(&h, "R1", &[OperationCode::MlAnalysis]).await;
        h.coordinator.poll(&r1).await.unwrap();
        h.coordinator.acknowledge(&task_id, &r1).await.unwrap();

        let r2 = runner(&h, "R2", &[OperationCode::MlAnalysis]).await;
        let later = Utc::now() + Duration::seconds(60);
        let window = Duration::seconds(45);
        let retention = Duration::seconds(600);

        let report = h.coordinator.sweep_at(window, retention, later).await;
        assert!(report.expired.contains(&r1));
        assert_eq!(report.requeued, vec![task_id.clone()]);

        let task = h.store.get(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_to.is_none());

        let again = h.coordinator.sweep_at(window, retention, later).await;
        assert!(again.expired.is_empty());
        assert!(again.requeued.is_empty());

        // R2 was idle during the sweep; its next poll revives it.
        let task = h.coordinator.poll(&r2).await.unwrap().unwrap();
        assert_eq!(task.id, task_id);
        assert_eq!(task.assigned_to, Some(r2));
        assert_eq!(task.attempts, 2);
    }

    #[tokio::test]
    async fn test_release_of_finished_task_is_noop() {
        let h = harness();
        let task_id = h.coordinator.submit_task(100, json!({})).await.unwrap();
        let r1 = runner(&h, "R1", &[OperationCode::FetchRawData]).await;
        h.coordinator.poll(&r1).await.unwrap();
        h.coordinator.acknowledge(&task_id, &r1).await.unwrap();
        h.store
            .update_status(
                &task_id,
                TaskStatus::Running,
                TaskStatus::Completed,
                TaskPatch::none(),
            )
            .await
            .unwrap();

        assert!(!h.coordinator.release(&r1, &task_id).await.unwrap());
        assert_eq!(h.store.get(&task_id).await.unwrap().status, TaskStatus::Completed);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_reregister_releases_held_task() {
        let h = harness();
        let task_id = h.coordinator.submit_task(100, json!({})).await.unwrap();
        let r1 = runner(&h, "R1", &[OperationCode::FetchRawData]).await;
        h.coordinator.poll(&r1).await.unwrap();

        runner(&h, "R1", &[OperationCode::FetchRawData]).await;
        let task = h.store.get(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(h.queue.len().await, 1);
    }
}
