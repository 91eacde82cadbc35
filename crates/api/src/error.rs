//! API error taxonomy

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Result type for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Longest response body kept on an error
pub const MAX_ERROR_BODY: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Credentials rejected. Never retried.
    #[error("Authentication failed: {message}")]
    Authentication { message: String, status: Option<u16> },

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed after {attempts} attempts")]
    Connection {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        attempts: u32,
        status: Option<u16>,
        #[source]
        source: Box<ApiError>,
    },

    /// Non-retryable HTTP failure
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// Unclassified non-success response, as returned by an operation
    #[error("Unexpected status {status}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("API client is closed")]
    Closed,
}

impl ApiError {
    pub fn authentication(message: impl Into<String>) -> Self {
        ApiError::Authentication {
            message: message.into(),
            status: None,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        ApiError::Status {
            status,
            body: truncate_body(body),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status, .. } => *status,
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Server { status, .. }
            | ApiError::Http { status, .. }
            | ApiError::Status { status, .. } => Some(*status),
            ApiError::MaxRetriesExceeded { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, ApiError::Authentication { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::Server { .. } | ApiError::Timeout(_) => true,
            ApiError::Status { status, .. } => *status == 500,
            ApiError::Transport(_) => true,
            _ => false,
        }
    }
}

/// Keep at most [`MAX_ERROR_BODY`] characters of a response body
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}
