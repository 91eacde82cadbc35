//! Error types for web capture

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Login failed after {attempts} attempt(s)")]
    LoginFailed {
        attempts: u32,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Failed to recover session after {attempts} attempt(s) in {operation}")]
    SessionExpired {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<E2eError>,
    },

    #[error(transparent)]
    Common(#[from] bankrecon_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_session_expired_keeps_cause() {
        let err = E2eError::SessionExpired {
            operation: "account sweep".to_string(),
            attempts: 2,
            source: Box::new(E2eError::Playwright("Target closed".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Failed to recover session after 2 attempt(s) in account sweep"
        );
        let cause = err.source().map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("Playwright error: Target closed"));
    }
}
