//! HTTP API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::BootstrappedServices;
use crate::services::PlaybackMirror;
use crate::state::Config;

pub mod http;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port or serve connections.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// The build → diff → push pipeline.
    pub mirror: Arc<PlaybackMirror>,
    /// Application configuration.
    pub config: Arc<Config>,
    /// Fires when the server is shutting down.
    pub cancel_token: CancellationToken,
    /// Server start time (Unix milliseconds).
    pub deploy_time: u64,
}

impl AppState {
    /// Creates the API state from bootstrapped services.
    pub fn new(services: &BootstrappedServices, config: Arc<Config>) -> Self {
        Self {
            mirror: Arc::clone(&services.mirror),
            config,
            cancel_token: services.cancel_token.clone(),
            deploy_time: services.deploy_time,
        }
    }
}

/// Starts the HTTP server on the configured port.
///
/// Port 0 lets the OS pick one. Returns once the cancellation token fires
/// and in-flight requests have finished.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.preferred_port));
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, state).await
}

/// Serves the API on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    let port = listener.local_addr()?.port();
    log::info!("[Server] Listening on http://0.0.0.0:{}", port);

    let shutdown = state.cancel_token.clone();
    let app = http::create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    log::info!("[Server] Stopped");
    Ok(())
}
