//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use datarun_core::TaskStatus;

use crate::state::AppState;

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_runner_metrics(state, &mut output).await;
    collect_task_metrics(state, &mut output).await;
    collect_queue_metrics(state, &mut output).await;

    output
}

/// Collect runner metrics by liveness.
async fn collect_runner_metrics(state: &Arc<AppState>, output: &mut String) {
    let (active, expired) = state.registry.count_by_liveness().await;

    writeln!(
        output,
        "# HELP datarun_runners_registered Number of registered runners by liveness"
    )
    .ok();
    writeln!(output, "# TYPE datarun_runners_registered gauge").ok();
    writeln!(output, "datarun_runners_registered{{status=\"active\"}} {active}").ok();
    writeln!(output, "datarun_runners_registered{{status=\"expired\"}} {expired}").ok();
}

/// Collect task metrics by status.
async fn collect_task_metrics(state: &Arc<AppState>, output: &mut String) {
    let counts = state.store.count_by_status().await;

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP datarun_tasks_total Total number of tasks by status"
    )
    .ok();
    writeln!(output, "# TYPE datarun_tasks_total gauge").ok();
    for status in TaskStatus::ALL {
        let count = counts.get(&status).copied().unwrap_or(0);
        writeln!(output, "datarun_tasks_total{{status=\"{status}\"}} {count}").ok();
    }
}

/// Collect dispatch queue depth.
async fn collect_queue_metrics(state: &Arc<AppState>, output: &mut String) {
    let depth = state.queue.len().await;

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP datarun_queue_depth Number of tasks waiting in the dispatch queue"
    )
    .ok();
    writeln!(output, "# TYPE datarun_queue_depth gauge").ok();
    writeln!(output, "datarun_queue_depth {depth}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    #[tokio::test]
    async fn test_collect_metrics_empty_state() {
        let state = AppState::new(&Config::default());
        let output = collect_metrics(&state).await;

        assert!(output.contains("datarun_runners_registered{status=\"active\"} 0"));
        assert!(output.contains("datarun_tasks_total{status=\"pending\"} 0"));
        assert!(output.contains("datarun_queue_depth 0"));
    }

    #[tokio::test]
    async fn test_collect_metrics_counts_tasks() {
        let state = AppState::new(&Config::default());
        state.coordinator.submit_task(100, json!({})).await.unwrap();
        state.coordinator.submit_task(200, json!({})).await.unwrap();

        let output = collect_metrics(&state).await;
        assert!(output.contains("datarun_tasks_total{status=\"pending\"} 2"));
        assert!(output.contains("datarun_queue_depth 2"));
    }
}
