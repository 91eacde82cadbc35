//! Classified exponential-backoff retry for HTTP operations

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bankrecon_common::{Backoff, Sleeper, TokioSleeper};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::transport::{TransportError, TransportErrorKind};

/// Retries allowed for the login call
pub const AUTH_MAX_RETRIES: u32 = 2;

/// Retries allowed for data calls
pub const DATA_MAX_RETRIES: u32 = 3;

/// What the policy does with one failed attempt
#[derive(Debug)]
enum Outcome {
    /// Terminal failure, returned as is
    Fail(ApiError),
    /// Retry; exhaustion reports `MaxRetriesExceeded`
    Transient {
        error: ApiError,
        delay: Option<Duration>,
    },
    /// Retry; exhaustion reports `Connection`
    TransportFault(TransportError),
}

fn classify(error: ApiError) -> Outcome {
    match error {
        ApiError::Status { status, body } => match status {
            401 | 403 => Outcome::Fail(ApiError::Authentication {
                message: format!("request rejected with status {}", status),
                status: Some(status),
            }),
            500 => Outcome::Transient {
                error: ApiError::Server { status, body },
                delay: None,
            },
            _ => Outcome::Fail(ApiError::Http { status, body }),
        },
        ApiError::Transport(e) => match e.kind {
            TransportErrorKind::Connect | TransportErrorKind::Timeout => Outcome::Transient {
                error: ApiError::Transport(e),
                delay: None,
            },
            TransportErrorKind::Other => Outcome::TransportFault(e),
        },
        ApiError::RateLimited { retry_after } => Outcome::Transient {
            error: ApiError::RateLimited { retry_after },
            delay: retry_after,
        },
        e @ (ApiError::Server { .. } | ApiError::Timeout(_)) => Outcome::Transient {
            error: e,
            delay: None,
        },
        other => Outcome::Fail(other),
    }
}

/// Retry policy for HTTP operations.
///
/// The first try is not counted: an operation runs at most
/// `max_retries + 1` times and sleeps at most `max_retries` times.
#[derive(Clone)]
pub struct HttpRetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for HttpRetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl Default for HttpRetryPolicy {
    fn default() -> Self {
        Self::new(DATA_MAX_RETRIES)
    }
}

impl HttpRetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn wait_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(requested) => requested.min(self.backoff.max_delay()),
            None => self.backoff.delay(attempt),
        }
    }

    /// Run `op` until it succeeds, fails terminally, or retries run out.
    ///
    /// Operations report non-success responses as [`ApiError::Status`] and
    /// transport failures as [`ApiError::Transport`]; the policy turns
    /// them into the terminal error types.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let failure = match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, retries = attempt, "{} succeeded after {} retries", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };
            attempt += 1;

            match classify(failure) {
                Outcome::Fail(e) => {
                    match &e {
                        ApiError::Authentication { .. } | ApiError::Http { .. } => {
                            error!(operation, error = %e, "Request failed");
                        }
                        _ => error!(operation, error = %e, "Unexpected error in {}", operation),
                    }
                    return Err(e);
                }
                Outcome::Transient { error, delay } => {
                    if attempt > self.max_retries {
                        warn!(operation, attempts = attempt, error = %error, "Max retries exceeded");
                        return Err(ApiError::MaxRetriesExceeded {
                            attempts: attempt,
                            status: error.status_code(),
                            source: Box::new(error),
                        });
                    }
                    let wait = self.wait_for(attempt, delay);
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        wait_secs = wait.as_secs_f64(),
                        error = %error,
                        "Transient failure, retrying"
                    );
                    self.sleeper.sleep(wait).await;
                }
                Outcome::TransportFault(source) => {
                    if attempt > self.max_retries {
                        warn!(operation, attempts = attempt, error = %source, "Request failed after retries");
                        return Err(ApiError::Connection {
                            attempts: attempt,
                            source,
                        });
                    }
                    let wait = self.wait_for(attempt, None);
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        wait_secs = wait.as_secs_f64(),
                        error = %source,
                        "Request error, retrying"
                    );
                    self.sleeper.sleep(wait).await;
                }
            }
        }
    }
}
