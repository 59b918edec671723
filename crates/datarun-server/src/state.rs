//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::ApiKeyGuard;
use crate::collector::ResultCollector;
use crate::config::Config;
use crate::coordinator::AssignmentCoordinator;
use crate::queue::DispatchQueue;
use crate::registry::RunnerRegistry;
use crate::store::TaskStore;

/// Shared application state.
pub struct AppState {
    /// Task records.
    pub store: Arc<TaskStore>,

    /// Pending task queue.
    pub queue: Arc<DispatchQueue>,

    /// Registered runners.
    pub registry: Arc<RunnerRegistry>,

    /// Task-to-runner matching.
    pub coordinator: AssignmentCoordinator,

    /// Result intake.
    pub collector: ResultCollector,

    /// Api key check for task creation.
    pub auth: ApiKeyGuard,

    /// When the server started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(config: &Config) -> Arc<Self> {
        let store = Arc::new(TaskStore::new());
        let queue = Arc::new(DispatchQueue::new());
        let registry = Arc::new(RunnerRegistry::new());

        Arc::new(Self {
            coordinator: AssignmentCoordinator::new(store.clone(), queue.clone(), registry.clone()),
            collector: ResultCollector::new(store.clone(), registry.clone()),
            auth: ApiKeyGuard::new(config.api_key.as_deref()),
            store,
            queue,
            registry,
            started_at: Utc::now(),
        })
    }
}
