//! Runner registry - liveness and capability of connected runners.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::info;

use datarun_core::{CapabilitySet, CoreError, RunnerId, RunnerInfo, RunnerLiveness, TaskId};

/// A registered runner's state.
#[derive(Debug, Clone)]
pub struct RunnerRecord {
    /// Information declared at registration.
    pub info: RunnerInfo,

    /// Whether the runner is within its liveness window.
    pub liveness: RunnerLiveness,

    /// When the runner (last) registered.
    pub registered_at: DateTime<Utc>,

    /// Timestamp of last heartbeat or poll.
    pub last_heartbeat: DateTime<Utc>,

    /// Task the runner currently holds.
    pub current_task: Option<TaskId>,
}

/// A runner declared dead by a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredRunner {
    pub runner_id: RunnerId,
    /// Assignment the runner held when it expired.
    pub assignment: Option<TaskId>,
}

/// Registry of runners indexed by RunnerId.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: RwLock<HashMap<RunnerId, RunnerRecord>>,
}

impl RunnerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a runner with a fresh liveness window.
    ///
    /// Returns the assignment held under the previous registration, if any;
    /// the caller must release it because the runner starts over.
    pub async fn register(&self, info: RunnerInfo) -> Option<TaskId> {
        let now = Utc::now();
        let runner_id = info.runner_id.clone();
        let record = RunnerRecord {
            info,
            liveness: RunnerLiveness::Active,
            registered_at: now,
            last_heartbeat: now,
            current_task: None,
        };

        let previous = self.runners.write().await.insert(runner_id, record);
        previous.and_then(|p| p.current_task)
    }

    /// Refresh a runner's liveness window.
    ///
    /// An expired runner that has not been purged yet is revived.
    pub async fn heartbeat(&self, runner_id: &RunnerId) -> Result<RunnerLiveness, CoreError> {
        let mut runners = self.runners.write().await;
        let record = runners
            .get_mut(runner_id)
            .ok_or_else(|| CoreError::RunnerNotFound(runner_id.clone()))?;

        record.last_heartbeat = Utc::now();
        if record.liveness == RunnerLiveness::Expired {
            info!(runner_id = %runner_id, "Expired runner revived by heartbeat");
            record.liveness = RunnerLiveness::Active;
        }
        Ok(record.liveness)
    }

    /// Mark runners silent for longer than `window` as expired.
    pub async fn sweep_dead(&self, window: Duration) -> Vec<ExpiredRunner> {
        self.sweep_dead_at(window, Utc::now()).await
    }

    /// [`Self::sweep_dead`] evaluated at a given instant.
    ///
    /// Each runner is reported once; its assignment is detached from the
    /// registry and handed back to the caller.
    pub async fn sweep_dead_at(&self, window: Duration, now: DateTime<Utc>) -> Vec<ExpiredRunner> {
        let mut runners = self.runners.write().await;
        let mut expired = Vec::new();

        for (runner_id, record) in runners.iter_mut() {
            if record.liveness != RunnerLiveness::Active {
                continue;
            }
            if now.signed_duration_since(record.last_heartbeat) <= window {
                continue;
            }
            record.liveness = RunnerLiveness::Expired;
            expired.push(ExpiredRunner {
                runner_id: runner_id.clone(),
                assignment: record.current_task.take(),
            });
        }

        expired.sort_by(|a, b| a.runner_id.cmp(&b.runner_id));
        expired
    }

    /// Remove expired runners absent for longer than `retention`.
    pub async fn purge(&self, retention: Duration) -> Vec<RunnerId> {
        self.purge_at(retention, Utc::now()).await
    }

    /// [`Self::purge`] evaluated at a given instant.
    pub async fn purge_at(&self, retention: Duration, now: DateTime<Utc>) -> Vec<RunnerId> {
        let mut runners = self.runners.write().await;
        let stale: Vec<RunnerId> = runners
            .iter()
            .filter(|(_, r)| {
                r.liveness == RunnerLiveness::Expired
                    && now.signed_duration_since(r.last_heartbeat) > retention
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            runners.remove(id);
        }
        stale
    }

    /// Snapshot of a runner.
    pub async fn get(&self, runner_id: &RunnerId) -> Result<RunnerRecord, CoreError> {
        self.runners
            .read()
            .await
            .get(runner_id)
            .cloned()
            .ok_or_else(|| CoreError::RunnerNotFound(runner_id.clone()))
    }

    /// Capabilities of a runner.
    pub async fn capabilities(&self, runner_id: &RunnerId) -> Result<CapabilitySet, CoreError> {
        self.get(runner_id).await.map(|r| r.info.capabilities)
    }

    /// Snapshot of every runner, ordered by id.
    pub async fn list(&self) -> Vec<RunnerRecord> {
        let mut records: Vec<RunnerRecord> = self.runners.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.info.runner_id.cmp(&b.info.runner_id));
        records
    }

    /// Record that `runner_id` now holds `task_id`.
    ///
    /// Fails with a conflict if the runner already holds a different task.
    pub async fn bind_assignment(
        &self,
        runner_id: &RunnerId,
        task_id: &TaskId,
    ) -> Result<(), CoreError> {
        let mut runners = self.runners.write().await;
        let record = runners
            .get_mut(runner_id)
            .ok_or_else(|| CoreError::RunnerNotFound(runner_id.clone()))?;

        match &record.current_task {
            Some(current) if current != task_id => Err(CoreError::conflict(
                task_id,
                format!("runner {runner_id} already holds task {current}"),
            )),
            _ => {
                record.current_task = Some(task_id.clone());
                Ok(())
            }
        }
    }

    /// Detach `task_id` from `runner_id`. Returns false if it was not bound.
    pub async fn clear_assignment(&self, runner_id: &RunnerId, task_id: &TaskId) -> bool {
        let mut runners = self.runners.write().await;
        match runners.get_mut(runner_id) {
            Some(record) if record.current_task.as_ref() == Some(task_id) => {
                record.current_task = None;
                true
            }
            _ => false,
        }
    }

    /// Number of runners in each liveness state.
    pub async fn count_by_liveness(&self) -> (u64, u64) {
        let runners = self.runners.read().await;
        let active = runners
            .values()
            .filter(|r| r.liveness == RunnerLiveness::Active)
            .count() as u64;
        (active, runners.len() as u64 - active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str) -> RunnerInfo {
        RunnerInfo::new(RunnerId::new(id), "test runner")
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_runner() {
        let registry = RunnerRegistry::new();
        let err = registry.heartbeat(&RunnerId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, CoreError::RunnerNotFound(_)));
    }

    #[tokio::test]
    async fn test_sweep_reports_each_dead_runner_once() {
        let registry = RunnerRegistry::new();
        registry.register(info("R1")).await;
        registry
            .bind_assignment(&RunnerId::new("R1"), &TaskId::new("A"))
            .await
            .unwrap();

        let later = Utc::now() + Duration::seconds(60);
        let expired = registry.sweep_dead_at(Duration::seconds(45), later).await;
        assert_eq!(
            expired,
            vec![ExpiredRunner {
                runner_id: RunnerId::new("R1"),
                assignment: Some(TaskId::new("A")),
            }]
        );

        let again = registry.sweep_dead_at(Duration::seconds(45), later).await;
        assert!(again.is_empty());

        let record = registry.get(&RunnerId::new("R1")).await.unwrap();
        assert_eq!(record.liveness, RunnerLiveness::Expired);
        assert!(record.current_task.is_none());
    }

    #[tokio::test]
    async fn test_live_runner_not_swept() {
        let registry = RunnerRegistry::new();
        registry.register(info("R1")).await;
        let expired = registry.sweep_dead(Duration::seconds(45)).await;
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_revives_expired_runner() {
        let registry = RunnerRegistry::new();
        registry.register(info("R1")).await;
        registry
            .sweep_dead_at(Duration::seconds(1), Utc::now() + Duration::seconds(10))
            .await;

        let liveness = registry.heartbeat(&RunnerId::new("R1")).await.unwrap();
        assert_eq!(liveness, RunnerLiveness::Active);
    }

    #[tokio::test]
    async fn test_purge_removes_only_long_expired() {
        let registry = RunnerRegistry::new();
        registry.register(info("old")).await;
        registry.register(info("fresh")).await;

        let later = Utc::now() + Duration::seconds(700);
        registry.sweep_dead_at(Duration::seconds(45), later).await;
        registry.heartbeat(&RunnerId::new("fresh")).await.unwrap();

        let purged = registry.purge_at(Duration::seconds(600), later).await;
        assert_eq!(purged, vec![RunnerId::new("old")]);
        assert!(registry.get(&RunnerId::new("fresh")).await.is_ok());
        assert_eq!(registry.count_by_liveness().await, (1, 0));
    }

    #[tokio::test]
    async fn test_bind_rejects_second_assignment() {
        let registry = RunnerRegistry::new();
        let r1 = RunnerId::new("R1");
        registry.register(info("R1")).await;

        registry.bind_assignment(&r1, &TaskId::new("A")).await.unwrap();
        registry.bind_assignment(&r1, &TaskId::new("A")).await.unwrap();
        let err = registry.bind_assignment(&r1, &TaskId::new("B")).await.unwrap_err();
        assert!(err.is_conflict());

        assert!(!registry.clear_assignment(&r1, &TaskId::new("B")).await);
        assert!(registry.clear_assignment(&r1, &TaskId::new("A")).await);
    }

    #[tokio::test]
    async fn test_reregister_returns_previous_assignment() {
        let registry = RunnerRegistry::new();
        let r1 = RunnerId::new("R1");
        registry.register(info("R1")).await;
        registry.bind_assignment(&r1, &TaskId::new("A")).await.unwrap();

        let previous = registry.register(info("R1")).await;
        assert_eq!(previous, Some(TaskId::new("A")));
        assert!(registry.get(&r1).await.unwrap().current_task.is_none());
    }
}
