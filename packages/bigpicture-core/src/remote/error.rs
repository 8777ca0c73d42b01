//! Classified failures of a single remote request.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::protocol_constants::DEFAULT_RETRY_AFTER_SECS;

/// Errors that can occur during one request to the remote service.
///
/// The variants encode how the [`RemoteCallExecutor`](super::RemoteCallExecutor)
/// reacts: rate limits and transient failures are retried with backoff,
/// authorization failures trigger a credential refresh, everything else is
/// surfaced immediately.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service asked us to slow down (HTTP 429).
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The access credential was rejected or has expired (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Server-side failure that may succeed on retry (HTTP 5xx).
    #[error("Transient failure (HTTP {status}): {message}")]
    Transient { status: u16, message: String },

    /// The service refused the request and retrying will not help (other 4xx).
    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The HTTP request itself failed (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenient Result alias for remote requests.
pub type RemoteResult<T> = Result<T, RemoteError>;

impl RemoteError {
    /// Classifies a non-success HTTP response.
    ///
    /// `retry_after` is the raw `Retry-After` header value, if present.
    pub fn from_status(status: StatusCode, retry_after: Option<&str>, body: String) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized(body),
            429 => Self::RateLimited {
                retry_after: parse_retry_after(retry_after),
            },
            code if status.is_server_error() => Self::Transient {
                status: code,
                message: body,
            },
            code => Self::Rejected {
                status: code,
                message: body,
            },
        }
    }

    /// Server-specified wait of a rate-limit error.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns true if this error is transient and the request should be retried
    /// after the generic backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            _ => false,
        }
    }
}

/// Parses a `Retry-After` header given in whole seconds.
fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS))
}
