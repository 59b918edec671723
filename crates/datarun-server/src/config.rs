//! Server configuration.

use clap::Parser;

/// Upper bound for any configured window, in seconds (one year).
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// datarun dispatch server.
#[derive(Parser, Debug, Clone)]
#[command(name = "datarun-server", about = "datarun task dispatch server")]
pub struct Config {
    /// HTTP bind address.
    #[arg(long, env = "DATARUN_BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: String,

    /// Shared key required to create tasks. Unset means no key is required.
    #[arg(long, env = "DATARUN_API_KEY")]
    pub api_key: Option<String>,

    /// Heartbeat timeout before a runner is considered dead (seconds).
    #[arg(
        long,
        env = "DATARUN_LIVENESS_WINDOW_SECS",
        default_value_t = 45,
        value_parser = clap::value_parser!(u64).range(1..=MAX_WINDOW_SECS)
    )]
    pub liveness_window_secs: u64,

    /// How often dead runners are swept (seconds).
    #[arg(
        long,
        env = "DATARUN_SWEEP_INTERVAL_SECS",
        default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..=MAX_WINDOW_SECS)
    )]
    pub sweep_interval_secs: u64,

    /// How long an expired runner is kept before removal (seconds).
    #[arg(
        long,
        env = "DATARUN_RUNNER_RETENTION_SECS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..=MAX_WINDOW_SECS)
    )]
    pub runner_retention_secs: u64,
}

impl Config {
    /// Liveness window as a chrono duration.
    pub fn liveness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.liveness_window_secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// Retention window as a chrono duration.
    pub fn runner_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.runner_retention_secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// Sweep period.
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.clamp(1, MAX_WINDOW_SECS))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            api_key: None,
            liveness_window_secs: 45,
            sweep_interval_secs: 15,
            runner_retention_secs: 600,
        }
    }
}
