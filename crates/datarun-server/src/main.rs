//! datarun Dispatch Server

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use datarun_server::{http, sweeper, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("datarun_server=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with_target(true)
        .init();

    // Load config
    let config = Config::parse();
    let addr: SocketAddr = config.bind_addr.parse()?;

    if config.api_key.is_none() {
        warn!("No api key configured - task creation is open to anyone");
    }

    // Create shared state
    let state = AppState::new(&config);

    info!(
        addr = %addr,
        liveness_window_secs = config.liveness_window_secs,
        sweep_interval_secs = config.sweep_interval_secs,
        "Starting datarun dispatch server"
    );

    let sweeper = sweeper::spawn_sweeper(state.clone(), &config);

    let router = http::create_router(state);
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
