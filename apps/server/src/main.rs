//! BigPicture Server - Standalone headless server for the BigPicture mirror.
//!
//! Mirrors the playback state of a remote player and serves it to viewers
//! as a push stream (`/events`) and on demand (`/playback`).

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bigpicture_core::{bootstrap_services, start_server, AppState};
use clap::Parser;
use tokio::signal;

use crate::config::ServerConfig;

/// BigPicture Server - Pushes remote playback state to connected viewers.
#[derive(Parser, Debug)]
#[command(name = "bigpicture-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "BIGPICTURE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "BIGPICTURE_BIND_PORT")]
    port: Option<u16>,

    /// Poll interval in milliseconds (overrides config file).
    #[arg(long, env = "BIGPICTURE_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("BigPicture Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(interval) = args.poll_interval_ms {
        config.poll_interval_ms = interval;
    }

    log::info!(
        "Configuration: bind_port={}, poll_interval_ms={}",
        config.bind_port,
        config.poll_interval_ms
    );

    let credentials = config.credentials()?;
    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config, credentials)
        .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // A failed refresh is not fatal: the executor refreshes again on the first 401.
    if let Err(e) = services.refresh_credentials().await {
        log::warn!("Initial credential refresh failed: {}", e);
    }

    services.start_background_tasks();

    log::info!("Background tasks started");

    let app_state = AppState::new(&services, Arc::new(core_config));
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown; the server stops once the cancellation token fires
    services.shutdown().await;
    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
