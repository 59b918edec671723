//! Session with the dispatch server.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use datarun_api::AssignmentResponse;
use datarun_client::{ClientError, RunnerClient};
use datarun_core::{Operation, RunnerId, TaskId, TaskOutcome};

use crate::config::Config;
use crate::executor::Executor;

/// What one poll round did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    Completed(TaskId),
    Failed(TaskId),
    /// The server no longer considers us the holder.
    Discarded(TaskId),
}

/// Manages one registration with the server.
pub struct RunnerConnection {
    config: Arc<Config>,
    client: RunnerClient,
    executor: Arc<dyn Executor>,
    runner_id: RunnerId,
}

impl RunnerConnection {
    /// Create a new RunnerConnection.
    pub fn new(
        config: Arc<Config>,
        client: RunnerClient,
        executor: Arc<dyn Executor>,
        runner_id: RunnerId,
    ) -> Self {
        Self {
            config,
            client,
            executor,
            runner_id,
        }
    }

    pub fn runner_id(&self) -> &RunnerId {
        &self.runner_id
    }

    /// Register, then poll until the connection fails.
    /// Returns on error (caller should handle reconnection).
    pub async fn connect_and_run(&mut self) -> Result<(), ClientError> {
        self.register().await?;

        let heartbeat_handle = self.spawn_heartbeat();
        let result = self.poll_loop().await;
        heartbeat_handle.abort();

        info!(runner_id = %self.runner_id, "Disconnected from server");
        result
    }

    /// Register under our runner id.
    pub async fn register(&mut self) -> Result<(), ClientError> {
        info!(server = %self.config.server, "Registering with server");

        self.runner_id = self
            .client
            .register(
                Some(&self.runner_id),
                self.config.name.as_deref(),
                &self.executor.capabilities(),
            )
            .await?;

        info!(
            runner_id = %self.runner_id,
            capabilities = ?self.executor.capabilities().codes(),
            "Registered successfully"
        );
        Ok(())
    }

    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let runner_id = self.runner_id.clone();
        let period = self.config.heartbeat_interval();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);
            loop {
                interval_timer.tick().await;
                match client.heartbeat(&runner_id).await {
                    Ok(status) => debug!(runner_id = %runner_id, status = %status, "Heartbeat sent"),
                    Err(e) => warn!(runner_id = %runner_id, error = %e, "Heartbeat failed"),
                }
            }
        })
    }

    async fn poll_loop(&self) -> Result<(), ClientError> {
        loop {
            // After a task, ask for more work straight away.
            if self.poll_once().await? == PollOutcome::Idle {
                tokio::time::sleep(self.config.poll_interval()).await;
            }
        }
    }

    /// Poll once and run whatever was handed out.
    pub async fn poll_once(&self) -> Result<PollOutcome, ClientError> {
        match self.client.poll(&self.runner_id).await? {
            Some(assignment) => self.run_assignment(assignment).await,
            None => Ok(PollOutcome::Idle),
        }
    }

    async fn run_assignment(&self, assignment: AssignmentResponse) -> Result<PollOutcome, ClientError> {
        let task_id = TaskId::new(assignment.task_id);
        info!(
            task_id = %task_id,
            operation = assignment.operation_code.name(),
            "Received task"
        );

        match self.client.start(&task_id, &self.runner_id).await {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                warn!(task_id = %task_id, error = %e, "Task no longer ours, skipping");
                return Ok(PollOutcome::Discarded(task_id));
            }
            Err(e) => return Err(e),
        }

        let params = Value::Object(assignment.params);
        let result = match Operation::parse(assignment.operation_code, &params) {
            Ok(operation) => self.executor.execute(operation).await,
            Err(e) => Err(e.into()),
        };

        let outcome = match result {
            Ok(data) => TaskOutcome::Completed(data),
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Task execution failed");
                TaskOutcome::Failed(e.to_string())
            }
        };
        let failed = matches!(outcome, TaskOutcome::Failed(_));

        match self
            .client
            .submit_result(&task_id, &self.runner_id, outcome)
            .await
        {
            Ok(_) => {
                info!(task_id = %task_id, failed, "Result submitted");
                Ok(if failed {
                    PollOutcome::Failed(task_id)
                } else {
                    PollOutcome::Completed(task_id)
                })
            }
            Err(e) if e.is_conflict() => {
                warn!(task_id = %task_id, error = %e, "Result discarded by server");
                Ok(PollOutcome::Discarded(task_id))
            }
            Err(e) => Err(e),
        }
    }
}
