//! Remote playback service access.
//!
//! - [`WebApiClient`]: one-request-per-method HTTP client
//! - [`RemoteCallExecutor`]: retry, backoff and credential refresh around those requests
//! - [`TokenRefresher`] / [`SingleFlightRefresher`]: access token renewal

mod auth;
mod client;
mod error;
mod executor;
pub mod models;
mod traits;

use std::sync::Arc;

pub use auth::{AccessToken, ClientCredentials, SingleFlightRefresher, TokenRefresher};
pub use client::WebApiClient;
pub use error::{RemoteError, RemoteResult};
pub use executor::{ExecutorError, ExecutorResult, RemoteCallExecutor, RetryPolicy};
pub use traits::{CredentialRefresher, PlaybackApi};

/// The API together with the executor that must wrap every call to it.
#[derive(Clone)]
pub struct Remote {
    pub api: Arc<dyn PlaybackApi>,
    pub executor: Arc<RemoteCallExecutor>,
}

impl Remote {
    pub fn new(api: Arc<dyn PlaybackApi>, executor: Arc<RemoteCallExecutor>) -> Self {
        Self { api, executor }
    }
}
