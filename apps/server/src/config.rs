//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use bigpicture_core::{ArtworkConfig, ClientCredentials, Config, RetryConfig};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 picks a free port).
    /// Override: `BIGPICTURE_BIND_PORT`
    pub bind_port: u16,

    /// Interval between poll ticks in milliseconds.
    /// Override: `BIGPICTURE_POLL_INTERVAL_MS`
    pub poll_interval_ms: u64,

    /// Interval between heartbeat events in seconds.
    pub heartbeat_interval_secs: u64,

    /// Progress drift that forces a progress update, in milliseconds.
    pub progress_tolerance_ms: u64,

    /// Attempts per remote call before giving up.
    pub max_attempts: u32,

    /// Number of playlist tracks included in the listing.
    pub playlist_prefix_size: usize,

    /// Item URI or id → artwork URL overrides.
    pub artwork_overrides: HashMap<String, String>,

    /// Artwork shown for local files.
    /// Override: `BIGPICTURE_DEFAULT_ARTWORK`
    pub default_artwork: Option<String>,

    /// Search a public catalog for items without artwork.
    pub external_artwork_lookup: bool,

    /// OAuth client id.
    /// Override: `BIGPICTURE_CLIENT_ID`
    pub client_id: Option<String>,

    /// OAuth client secret.
    /// Override: `BIGPICTURE_CLIENT_SECRET`
    pub client_secret: Option<String>,

    /// Long-lived refresh token.
    /// Override: `BIGPICTURE_REFRESH_TOKEN`
    pub refresh_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = Config::default();
        let artwork = ArtworkConfig::default();
        Self {
            bind_port: core.preferred_port,
            poll_interval_ms: core.poll_interval_ms,
            heartbeat_interval_secs: core.heartbeat_interval_secs,
            progress_tolerance_ms: core.progress_tolerance_ms,
            max_attempts: core.retry.max_attempts,
            playlist_prefix_size: core.playlist_prefix_size,
            artwork_overrides: artwork.overrides,
            default_artwork: artwork.default_url,
            external_artwork_lookup: artwork.external_lookup,
            client_id: None,
            client_secret: None,
            refresh_token: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `BIGPICTURE_*` overrides looked up through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("BIGPICTURE_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(interval) = var("BIGPICTURE_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = interval;
        }

        if let Some(url) = var("BIGPICTURE_DEFAULT_ARTWORK") {
            self.default_artwork = Some(url);
        }

        if let Some(id) = var("BIGPICTURE_CLIENT_ID") {
            self.client_id = Some(id);
        }
        if let Some(secret) = var("BIGPICTURE_CLIENT_SECRET") {
            self.client_secret = Some(secret);
        }
        if let Some(token) = var("BIGPICTURE_REFRESH_TOKEN") {
            self.refresh_token = Some(token);
        }
    }

    /// Converts to bigpicture-core's Config type.
    pub fn to_core_config(&self) -> Config {
        Config {
            preferred_port: self.bind_port,
            poll_interval_ms: self.poll_interval_ms,
            heartbeat_interval_secs: self.heartbeat_interval_secs,
            progress_tolerance_ms: self.progress_tolerance_ms,
            retry: RetryConfig {
                max_attempts: self.max_attempts,
                ..Default::default()
            },
            playlist_prefix_size: self.playlist_prefix_size,
            artwork: ArtworkConfig {
                overrides: self.artwork_overrides.clone(),
                default_url: self.default_artwork.clone(),
                external_lookup: self.external_artwork_lookup,
            },
            ..Default::default()
        }
    }

    /// Returns the API credentials, failing if any part is missing.
    pub fn credentials(&self) -> Result<ClientCredentials> {
        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            non_empty(&self.client_id),
            non_empty(&self.client_secret),
            non_empty(&self.refresh_token),
        ) else {
            bail!(
                "Missing API credentials. Set client_id, client_secret and refresh_token \
                 in the config file or BIGPICTURE_CLIENT_ID, BIGPICTURE_CLIENT_SECRET and \
                 BIGPICTURE_REFRESH_TOKEN."
            );
        };

        Ok(ClientCredentials {
            client_id,
            client_secret,
            refresh_token,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}
