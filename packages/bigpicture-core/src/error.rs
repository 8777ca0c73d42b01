//! Centralized error types for the BigPicture core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::artwork::ArtworkError;
use crate::remote::RemoteError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for RemoteError {
    fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Unauthorized(_) => "unauthorized",
            Self::Transient { .. } => "remote_unavailable",
            Self::Rejected { .. } => "remote_rejected",
            Self::Decode(_) => "remote_decode_failed",
            Self::Http(_) => "http_request_failed",
        }
    }
}

impl ErrorCode for ArtworkError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) | Self::Status(_) => "artwork_fetch_failed",
            Self::Decode(_) => "artwork_decode_failed",
            Self::Task(_) => "artwork_task_failed",
        }
    }
}

/// Application-wide error type for the BigPicture mirror.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum MirrorError {
    /// The remote playback service could not serve a request.
    #[error("Remote service error ({code}): {message}")]
    Remote { code: &'static str, message: String },

    /// The server is shutting down and no longer serves requests.
    #[error("Server is shutting down")]
    ShuttingDown,

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MirrorError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Remote { code, .. } => code,
            Self::ShuttingDown => "shutting_down",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Remote { .. } => StatusCode::BAD_GATEWAY,
            Self::ShuttingDown | Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for MirrorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RemoteError> for MirrorError {
    fn from(err: RemoteError) -> Self {
        Self::Remote {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
