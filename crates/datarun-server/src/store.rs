//! Task store - the source of truth for task records.
//!
//! Each record sits behind its own lock. Status changes go through
//! [`TaskStore::update_status`], a compare-and-swap against the stored status
//! (and optionally the owning runner), so concurrent claims and releases
//! never overwrite each other.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use datarun_core::{CoreError, Operation, RunnerId, Task, TaskId, TaskOutcome, TaskStatus};

use crate::queue::QueueEntry;

/// Field changes applied together with a status transition.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    /// Runner to record in `assigned_to`. Required when entering `assigned`.
    pub assigned_to: Option<RunnerId>,

    /// Outcome to store when entering a terminal state.
    pub outcome: Option<TaskOutcome>,

    /// Precondition: the task must currently be held by this runner.
    pub expect_owner: Option<RunnerId>,
}

impl TaskPatch {
    /// A patch that only changes status.
    pub fn none() -> Self {
        Self::default()
    }

    /// Patch for claiming a task on behalf of `runner_id`.
    pub fn assign(runner_id: RunnerId) -> Self {
        Self {
            assigned_to: Some(runner_id),
            ..Self::default()
        }
    }

    /// Builder method to require the current owner.
    pub fn owned_by(mut self, runner_id: RunnerId) -> Self {
        self.expect_owner = Some(runner_id);
        self
    }

    /// Builder method to attach an outcome.
    pub fn with_outcome(mut self, outcome: TaskOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

struct TaskRecord {
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct StoreIndex {
    records: HashMap<TaskId, Arc<Mutex<TaskRecord>>>,
    order: Vec<TaskId>,
    /// Creation sequence; only advanced under the write lock so that
    /// `order` and queue positions agree.
    next_seq: u64,
}

/// In-memory task store.
#[derive(Default)]
pub struct TaskStore {
    index: RwLock<StoreIndex>,
}

impl TaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and persist a new pending task.
    pub async fn create(&self, operation_code: i64, params: Value) -> Result<TaskId, CoreError> {
        let operation = Operation::from_raw(operation_code, &params)?;
        let params = match params {
            Value::Object(map) => map,
            // Operation::from_raw already rejected non-objects.
            _ => return Err(CoreError::Validation("params must be a JSON object".into())),
        };

        let task = Task::new(operation.code(), params);
        let task_id = task.id.clone();
        let mut index = self.index.write().await;
        let seq = index.next_seq;
        index.next_seq += 1;
        index
            .records
            .insert(task_id.clone(), Arc::new(Mutex::new(TaskRecord { seq, task })));
        index.order.push(task_id.clone());

        Ok(task_id)
    }

    async fn record(&self, task_id: &TaskId) -> Result<Arc<Mutex<TaskRecord>>, CoreError> {
        self.index
            .read()
            .await
            .records
            .get(task_id)
            .cloned()
            .ok_or_else(|| CoreError::TaskNotFound(task_id.clone()))
    }

    /// Snapshot of a task.
    pub async fn get(&self, task_id: &TaskId) -> Result<Task, CoreError> {
        let record = self.record(task_id).await?;
        let guard = record.lock().await;
        Ok(guard.task.clone())
    }

    /// Queue reference for a task, used when (re-)enqueuing it.
    pub async fn queue_entry(&self, task_id: &TaskId) -> Result<QueueEntry, CoreError> {
        let record = self.record(task_id).await?;
        let guard = record.lock().await;
        Ok(QueueEntry {
            task_id: guard.task.id.clone(),
            operation_code: guard.task.operation_code,
            seq: guard.seq,
        })
    }

    /// Snapshot of every task in creation order.
    pub async fn list_all(&self) -> Vec<Task> {
        let records: Vec<Arc<Mutex<TaskRecord>>> = {
            let index = self.index.read().await;
            index
                .order
                .iter()
                .filter_map(|id| index.records.get(id).cloned())
                .collect()
        };

        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            tasks.push(record.lock().await.task.clone());
        }
        tasks
    }

    /// Compare-and-swap the status of a task.
    ///
    /// Succeeds only if the stored status equals `expected` (and the owner
    /// matches `patch.expect_owner`, when given). Returns the updated task.
    pub async fn update_status(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        next: TaskStatus,
        patch: TaskPatch,
    ) -> Result<Task, CoreError> {
        if !expected.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: expected,
                to: next,
            });
        }
        if next == TaskStatus::Assigned && patch.assigned_to.is_none() {
            return Err(CoreError::Validation(
                "assignment requires a runner id".to_string(),
            ));
        }

        let record = self.record(task_id).await?;
        let mut guard = record.lock().await;
        let task = &mut guard.task;

        if task.status != expected {
            return Err(CoreError::conflict(
                task_id,
                format!("expected status {}, found {}", expected, task.status),
            ));
        }
        if let Some(owner) = &patch.expect_owner {
            if task.assigned_to.as_ref() != Some(owner) {
                let holder = task
                    .assigned_to
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "nobody".to_string());
                return Err(CoreError::conflict(
                    task_id,
                    format!("held by {holder}, not {owner}"),
                ));
            }
        }

        if let Some(runner_id) = patch.assigned_to {
            task.assigned_to = Some(runner_id);
        }
        task.enter(next);
        if let Some(outcome) = patch.outcome {
            task.record_outcome(outcome);
        }

        debug!(task_id = %task_id, from = %expected, to = %next, "Task status updated");
        Ok(task.clone())
    }

    /// Number of tasks in each status.
    pub async fn count_by_status(&self) -> HashMap<TaskStatus, u64> {
        let mut counts: HashMap<TaskStatus, u64> =
            TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for task in self.list_all().await {
            *counts.entry(task.status).or_default() += 1;
        }
        counts
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.index.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn pending_task(store: &TaskStore) -> TaskId {
        store.create(300, json!({"dataset": "x"})).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = TaskStore::new();
        let id = pending_task(&store).await;

        let task = store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.params.get("dataset"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let store = TaskStore::new();
        let err = store.create(999, json!({})).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = store.create(100, json!("not an object")).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = TaskStore::new();
        let err = store.get(&TaskId::new("missing")).await.unwrap_err();
        assert!(matches!(err, CoreError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_all_in_creation_order() {
        let store = TaskStore::new();
        let a = store.create(100, json!({})).await.unwrap();
        let b = store.create(200, json!({})).await.unwrap();
        let c = store.create(400, json!({})).await.unwrap();

        let ids: Vec<TaskId> = store.list_all().await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_cas_mismatch_is_conflict() {
        let store = TaskStore::new();
        let id = pending_task(&store).await;

        let err = store
            .update_status(&id, TaskStatus::Assigned, TaskStatus::Running, TaskPatch::none())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_disallowed_edge_rejected() {
        let store = TaskStore::new();
        let id = pending_task(&store).await;

        let err = store
            .update_status(&id, TaskStatus::Pending, TaskStatus::Completed, TaskPatch::none())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_owner_precondition() {
        let store = TaskStore::new();
        let id = pending_task(&store).await;
        let r1 = RunnerId::new("R1");

        store
            .update_status(&id, TaskStatus::Pending, TaskStatus::Assigned, TaskPatch::assign(r1.clone()))
            .await
            .unwrap();

        let err = store
            .update_status(
                &id,
                TaskStatus::Assigned,
                TaskStatus::Running,
                TaskPatch::none().owned_by(RunnerId::new("R2")),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let task = store
            .update_status(&id, TaskStatus::Assigned, TaskStatus::Running, TaskPatch::none().owned_by(r1))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_exactly_one_wins() {
        let store = Arc::new(TaskStore::new());
        let id = pending_task(&store).await;

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_status(
                        &id,
                        TaskStatus::Pending,
                        TaskStatus::Assigned,
                        TaskPatch::assign(RunnerId::new(format!("R{n}"))),
                    )
                    .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.get(&id).await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let store = TaskStore::new();
        pending_task(&store).await;
        let id = pending_task(&store).await;
        store
            .update_status(&id, TaskStatus::Pending, TaskStatus::Assigned, TaskPatch::assign(RunnerId::new("R1")))
            .await
            .unwrap();

        let counts = store.count_by_status().await;
        assert_eq!(counts[&TaskStatus::Pending], 1);
        assert_eq!(counts[&TaskStatus::Assigned], 1);
        assert_eq!(counts[&TaskStatus::Completed], 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_creates_keep_list_and_queue_order_aligned() {
        let store = Arc::new(TaskStore::new());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create(100, json!({})).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut seqs = Vec::new();
        for task in store.list_all().await {
            seqs.push(store.queue_entry(&task.id).await.unwrap().seq);
        }
        let expected: Vec<u64> = (0..32).collect();
        assert_eq!(seqs, expected);
    }
}
