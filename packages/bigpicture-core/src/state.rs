//! Core configuration types.
//!
//! All fields have sensible defaults so a partially specified YAML file (or
//! none at all) still yields a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artwork::ArtworkConfig;
use crate::protocol_constants::{
    ALBUM_IMMEDIATE_FETCH_LIMIT, API_BASE_URL, ACCOUNTS_TOKEN_URL, DEFAULT_HEARTBEAT_INTERVAL_SECS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROGRESS_TOLERANCE_MS, DEFAULT_SUBSCRIBER_BUFFER,
    GENERIC_BACKOFF_SECS, MAX_REMOTE_ATTEMPTS, PLAYLIST_PREFIX_SIZE, RATE_LIMIT_BASE_DELAY_MS,
};
use crate::remote::RetryPolicy;

/// Retry behavior of the remote call executor.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per remote call before giving up.
    pub max_attempts: u32,

    /// Constant term of the rate-limit backoff (milliseconds).
    pub rate_limit_base_delay_ms: u64,

    /// Backoff after generic transient failures (seconds).
    pub generic_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_REMOTE_ATTEMPTS,
            rate_limit_base_delay_ms: RATE_LIMIT_BASE_DELAY_MS,
            generic_backoff_secs: GENERIC_BACKOFF_SECS,
        }
    }
}

impl RetryConfig {
    /// Converts to the executor's policy type.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            rate_limit_base_delay: Duration::from_millis(self.rate_limit_base_delay_ms),
            generic_backoff: Duration::from_secs(self.generic_backoff_secs),
        }
    }
}

/// Configuration for the BigPicture mirror.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Server
    /// Port for the HTTP server.
    pub preferred_port: u16,

    // Scheduling
    /// Interval between poll ticks (milliseconds).
    pub poll_interval_ms: u64,

    /// Interval between heartbeat events (seconds).
    pub heartbeat_interval_secs: u64,

    /// Progress deviation that forces the progress field into a diff (milliseconds).
    pub progress_tolerance_ms: u64,

    /// Capacity of each subscriber's outgoing queue.
    pub subscriber_buffer: usize,

    // Remote
    /// Retry policy for remote calls.
    pub retry: RetryConfig,

    /// Base URL of the vendor Web API.
    pub api_base_url: String,

    /// Token endpoint used for credential refresh.
    pub accounts_url: String,

    // Context resolution
    /// Number of playlist tracks fetched for the listing.
    pub playlist_prefix_size: usize,

    /// Albums up to this many tracks are not paginated.
    pub album_immediate_fetch_limit: usize,

    // Artwork
    /// Artwork fallback chain configuration.
    pub artwork: ArtworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 8183,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            progress_tolerance_ms: DEFAULT_PROGRESS_TOLERANCE_MS,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            retry: RetryConfig::default(),
            api_base_url: API_BASE_URL.to_string(),
            accounts_url: ACCOUNTS_TOKEN_URL.to_string(),
            playlist_prefix_size: PLAYLIST_PREFIX_SIZE,
            album_immediate_fetch_limit: ALBUM_IMMEDIATE_FETCH_LIMIT,
            artwork: ArtworkConfig::default(),
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be >= 1".to_string());
        }
        if self.heartbeat_interval_secs == 0 {
            return Err("heartbeat_interval_secs must be >= 1".to_string());
        }
        if self.subscriber_buffer == 0 {
            return Err("subscriber_buffer must be >= 1 (mpsc::channel panics on 0)".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be >= 1".to_string());
        }
        if self.playlist_prefix_size == 0 {
            return Err("playlist_prefix_size must be >= 1".to_string());
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Heartbeat interval as a [`Duration`].
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}
