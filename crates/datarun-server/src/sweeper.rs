//! Periodic dead-runner sweep.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::state::AppState;

/// Spawn the sweep loop on its own timer, independent of request handling.
///
/// Sweep instants advance with the runtime clock from a wall-clock anchor
/// taken at spawn time.
pub fn spawn_sweeper(state: Arc<AppState>, config: &Config) -> JoinHandle<()> {
    let interval = config.sweep_interval();
    let liveness_window = config.liveness_window();
    let retention = config.runner_retention();

    tokio::spawn(async move {
        let anchor_wall = Utc::now();
        let anchor = Instant::now();
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;

            let elapsed = chrono::Duration::from_std(anchor.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero());
            let now = anchor_wall + elapsed;

            let report = state
                .coordinator
                .sweep_at(liveness_window, retention, now)
                .await;
            if !report.is_empty() {
                info!(
                    expired = report.expired.len(),
                    requeued = report.requeued.len(),
                    purged = report.purged.len(),
                    "Runner sweep completed"
                );
            }
        }
    })
}
