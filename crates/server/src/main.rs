//! Flight delay prediction service
//!
//! Loads the artifact bundle once at startup and serves predictions over
//! HTTP. A missing or corrupt bundle leaves the process up but not ready.

use anyhow::Result;
use ontime_server::{api, ServerConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting ontime-server");

    let config = ServerConfig::load()?;
    info!(
        bundle_path = ?config.bundle_path,
        service_name = %config.service_name,
        "Server configured"
    );

    let state = api::initialize_state(&config).await;
    let logger = state.logger.clone();

    let addr = config.socket_address();
    logger.log_startup(SERVICE_VERSION, &addr);

    api::serve(&addr, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
