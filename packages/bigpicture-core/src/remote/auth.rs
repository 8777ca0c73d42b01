//! Access credential storage and refresh.
//!
//! - [`AccessToken`]: shared cell read by every API request
//! - [`TokenRefresher`]: refresh-token grant against the accounts service
//! - [`SingleFlightRefresher`]: collapses concurrent refreshes into one

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;

use super::error::{RemoteError, RemoteResult};
use super::traits::CredentialRefresher;

/// The current bearer token, shared between the API client and the refresher.
#[derive(Clone, Default)]
pub struct AccessToken(Arc<RwLock<String>>);

impl AccessToken {
    /// Creates a cell holding `token` (may be empty until the first refresh).
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(token.into())))
    }

    #[must_use]
    pub fn get(&self) -> String {
        self.0.read().clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.0.write() = token.into();
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Application credentials plus the long-lived refresh token.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Some grants rotate the refresh token.
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Refreshes the access token with the OAuth refresh-token grant.
pub struct TokenRefresher {
    http: Client,
    token_url: String,
    credentials: RwLock<ClientCredentials>,
    token: AccessToken,
}

impl TokenRefresher {
    /// Creates a refresher that stores new tokens into `token`.
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        credentials: ClientCredentials,
        token: AccessToken,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            credentials: RwLock::new(credentials),
            token,
        }
    }
}

#[async_trait]
impl CredentialRefresher for TokenRefresher {
    async fn refresh(&self) -> RemoteResult<()> {
        let credentials = self.credentials.read().clone();
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
        ];

        let res = self
            .http
            .post(&self.token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&form)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let retry_after = res
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = res.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status, retry_after.as_deref(), body));
        }

        let response: TokenResponse = res
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        self.token.set(response.access_token);
        if let Some(rotated) = response.refresh_token {
            self.credentials.write().refresh_token = rotated;
        }
        log::info!(
            "[Auth] Access token refreshed (expires in {}s)",
            response.expires_in.unwrap_or(0)
        );
        Ok(())
    }
}

/// Wraps a [`CredentialRefresher`] so concurrent callers share one refresh.
///
/// Callers read [`generation`](Self::generation) *before* issuing the request
/// that failed. If another caller completed a refresh in the meantime, the
/// generation has moved on and [`refresh`](Self::refresh) returns immediately.
pub struct SingleFlightRefresher {
    inner: Arc<dyn CredentialRefresher>,
    generation: AtomicU64,
    in_flight: tokio::sync::Mutex<()>,
}

impl SingleFlightRefresher {
    pub fn new(inner: Arc<dyn CredentialRefresher>) -> Self {
        Self {
            inner,
            generation: AtomicU64::new(0),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Number of completed refreshes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Refreshes unless a refresh completed after `observed` was read.
    pub async fn refresh(&self, observed: u64) -> RemoteResult<()> {
        let _guard = self.in_flight.lock().await;
        if self.generation() != observed {
            log::debug!("[Auth] Credential already refreshed by a concurrent caller");
            return Ok(());
        }
        self.inner.refresh().await?;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
