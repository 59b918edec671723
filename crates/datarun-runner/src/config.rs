//! Runner configuration.

use std::time::Duration;

use clap::Parser;

use datarun_core::{CapabilitySet, CoreError, RunnerId};

/// datarun runner daemon.
#[derive(Parser, Debug, Clone)]
#[command(name = "datarun-runner", about = "Polls the datarun server for tasks and executes them")]
pub struct Config {
    /// Dispatch server URL.
    #[arg(long, env = "DATARUN_SERVER", default_value = "http://localhost:8000")]
    pub server: String,

    /// Poll interval when idle (seconds).
    #[arg(long, env = "DATARUN_POLL_INTERVAL", default_value_t = 5)]
    pub interval: u64,

    /// Heartbeat interval (seconds).
    #[arg(long, env = "DATARUN_HEARTBEAT_INTERVAL", default_value_t = 15)]
    pub heartbeat_interval: u64,

    /// Reconnection delay on connection loss (seconds).
    #[arg(long, default_value_t = 5)]
    pub reconnect_delay: u64,

    /// Operation codes to accept, comma separated. Empty accepts all.
    #[arg(long, value_delimiter = ',')]
    pub capabilities: Vec<i64>,

    /// Display name.
    #[arg(long)]
    pub name: Option<String>,

    /// Stable runner id. Generated once per process when absent.
    #[arg(long, env = "DATARUN_RUNNER_ID")]
    pub runner_id: Option<String>,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay)
    }

    /// The runner id to register under.
    pub fn runner_id(&self) -> RunnerId {
        self.runner_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(RunnerId::new)
            .unwrap_or_else(RunnerId::generate)
    }

    /// Declared capabilities.
    pub fn capability_set(&self) -> Result<CapabilitySet, CoreError> {
        CapabilitySet::from_codes(&self.capabilities)
    }
}
