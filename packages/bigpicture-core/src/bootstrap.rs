//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. The remote service, the
//! credential refresher and the image source enter as trait objects, so
//! tests can assemble the full pipeline around in-memory mocks.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::artwork::{ArtworkChain, ArtworkColorCache, HttpImageSource, ImageSource};
use crate::context::ContextResolver;
use crate::error::{MirrorError, MirrorResult};
use crate::protocol_constants::REMOTE_TIMEOUT_SECS;
use crate::remote::{
    AccessToken, ClientCredentials, CredentialRefresher, PlaybackApi, Remote, RemoteCallExecutor,
    SingleFlightRefresher, TokenRefresher, WebApiClient,
};
use crate::services::{BroadcastHub, PlaybackMirror, Scheduler, SnapshotBuilder, StateDiffEngine};
use crate::state::Config;
use crate::utils::now_millis;

/// Container for all bootstrapped services.
///
/// Cheap to clone; every clone refers to the same services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// The build → diff → push pipeline.
    pub mirror: Arc<PlaybackMirror>,
    /// Subscriber set the mirror pushes to.
    pub hub: Arc<BroadcastHub>,
    /// Memoized artwork colors.
    pub colors: Arc<ArtworkColorCache>,
    /// Shared credential refresh.
    pub refresher: Arc<SingleFlightRefresher>,
    /// Poll and heartbeat timers.
    pub scheduler: Arc<Scheduler>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// Server start time (Unix milliseconds), reported in every full snapshot.
    pub deploy_time: u64,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BootstrappedServices {
    /// Starts the scheduler timers.
    pub fn start_background_tasks(&self) {
        let handles = self.scheduler.start();
        self.tasks.lock().extend(handles);
    }

    /// Obtains a fresh access token.
    ///
    /// Call once at startup so the first tick does not begin with a 401.
    pub async fn refresh_credentials(&self) -> MirrorResult<()> {
        let generation = self.refresher.generation();
        self.refresher.refresh(generation).await?;
        Ok(())
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        // Signal cancellation to the timers and the HTTP server
        self.cancel_token.cancel();

        let closed = self.hub.close_all();
        log::info!("[Bootstrap] Closed {} subscriber(s)", closed);

        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("[Bootstrap] Background task ended abnormally: {}", e);
            }
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the shared HTTP client for the remote service and artwork fetches.
///
/// Using a shared client enables connection pooling for better performance.
fn create_http_client() -> MirrorResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
        .build()
        .map_err(|e| MirrorError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps all application services against the vendor Web API.
///
/// # Arguments
/// * `config` - Application configuration
/// * `credentials` - Client id, client secret and refresh token
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the HTTP client
/// cannot be created.
pub fn bootstrap_services(
    config: &Config,
    credentials: ClientCredentials,
) -> MirrorResult<BootstrappedServices> {
    config.validate().map_err(MirrorError::Configuration)?;

    let http = create_http_client()?;
    let token = AccessToken::default();

    let api = Arc::new(WebApiClient::new(
        http.clone(),
        config.api_base_url.clone(),
        token.clone(),
    ));
    let refresher = Arc::new(TokenRefresher::new(
        http.clone(),
        config.accounts_url.clone(),
        credentials,
        token,
    ));
    let images = Arc::new(HttpImageSource::new(http.clone()));
    let artwork = config.artwork.build_chain(http);

    Ok(assemble(config, api, refresher, images, artwork))
}

/// Wires the pipeline around the given collaborators.
///
/// The wiring order follows the data flow:
///
/// 1. Executor (single-flight credential refresh)
/// 2. Context resolver and artwork color cache
/// 3. Snapshot builder
/// 4. Diff engine, broadcast hub and mirror
/// 5. Scheduler
pub(crate) fn assemble(
    config: &Config,
    api: Arc<dyn PlaybackApi>,
    refresher: Arc<dyn CredentialRefresher>,
    images: Arc<dyn ImageSource>,
    artwork: ArtworkChain,
) -> BootstrappedServices {
    let deploy_time = now_millis();

    let refresher = Arc::new(SingleFlightRefresher::new(refresher));
    let executor = Arc::new(RemoteCallExecutor::new(
        config.retry.policy(),
        Arc::clone(&refresher),
    ));
    let remote = Remote::new(api, executor);

    let resolver = ContextResolver::new(remote.clone(), config);
    let colors = Arc::new(ArtworkColorCache::new(images));
    let builder = SnapshotBuilder::new(
        remote,
        resolver,
        artwork,
        Arc::clone(&colors),
        deploy_time,
    );

    let engine = StateDiffEngine::new(config.poll_interval_ms, config.progress_tolerance_ms);
    let hub = Arc::new(BroadcastHub::new(config.subscriber_buffer));
    let mirror = Arc::new(PlaybackMirror::new(builder, engine, Arc::clone(&hub)));

    let cancel_token = CancellationToken::new();
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&mirror),
        config.poll_interval(),
        config.heartbeat_interval(),
        cancel_token.clone(),
    ));

    BootstrappedServices {
        mirror,
        hub,
        colors,
        refresher,
        scheduler,
        cancel_token,
        deploy_time,
        tasks: Arc::new(Mutex::new(Vec::new())),
    }
}
