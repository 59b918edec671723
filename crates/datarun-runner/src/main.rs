//! datarun Runner Daemon

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod connection;
mod executor;

use config::Config;
use connection::RunnerConnection;
use datarun_client::{ClientConfig, RunnerClient};
use executor::BuiltinExecutor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("datarun_runner=info".parse()?),
        )
        .with_target(true)
        .init();

    // Load config
    let config = Arc::new(Config::parse());
    let capabilities = config.capability_set()?;
    let client = RunnerClient::new(&ClientConfig::new(config.server.clone()))?;
    let executor = Arc::new(BuiltinExecutor::new(capabilities));

    let mut connection = RunnerConnection::new(config.clone(), client, executor, config.runner_id());

    info!(
        runner_id = %connection.runner_id(),
        server = %config.server,
        poll_interval_secs = config.interval,
        "Starting datarun runner"
    );

    // Reconnection loop
    loop {
        tokio::select! {
            result = connection.connect_and_run() => {
                if let Err(e) = result {
                    error!(error = %e, "Connection error");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping runner");
                return Ok(());
            }
        }

        info!(
            delay_secs = config.reconnect_delay,
            "Reconnecting in {} seconds...", config.reconnect_delay
        );
        tokio::time::sleep(config.reconnect_delay()).await;
    }
}
