//! Browser session recovery
//!
//! Long scrapes can lose their login halfway through. A guarded job is
//! re-run from the start after re-authentication, so every job resets its
//! own accumulators at the top of each attempt.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bankrecon_common::{Backoff, Credentials, Sleeper, TokioSleeper};
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};

/// Error message fragments that point at a lost or broken session
pub const SESSION_ERROR_KEYWORDS: [&str; 6] = [
    "target closed",
    "session",
    "timeout",
    "navigation",
    "detached",
    "not found",
];

/// Total attempts for a guarded job
pub const DEFAULT_SESSION_RETRIES: u32 = 2;

/// Longest wait between attempts, in seconds
pub const MAX_SESSION_WAIT_SECS: f64 = 8.0;

pub fn is_session_error(error: &E2eError) -> bool {
    let message = error.to_string().to_lowercase();
    SESSION_ERROR_KEYWORDS
        .iter()
        .any(|keyword| message.contains(keyword))
}

/// Login state checks and recovery for a browser session
#[async_trait]
pub trait SessionControl: Send + Sync {
    /// True when the login form is showing or the session cannot be read
    async fn is_logged_out(&self) -> E2eResult<bool>;

    async fn re_authenticate(&self, credentials: &Credentials, base_url: &str) -> E2eResult<()>;
}

/// A unit of scraping work that can be restarted from scratch
#[async_trait]
pub trait RestartableJob<P: ?Sized + Sync>: Send {
    fn name(&self) -> &str;

    /// Drop partial results from an earlier attempt
    fn reset(&mut self);

    async fn run(&mut self, portal: &P) -> E2eResult<()>;
}

/// Session-loss retry policy.
///
/// Attempts are numbered `1..=max_retries`. After a session error on
/// attempt `n` the policy waits `min(2^n, 8)` seconds before the next.
#[derive(Clone)]
pub struct SessionRetryPolicy {
    pub max_retries: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for SessionRetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRetryPolicy")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for SessionRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_RETRIES)
    }
}

impl SessionRetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn schedule() -> Backoff {
        Backoff {
            factor: 2.0,
            max: MAX_SESSION_WAIT_SECS,
            jitter: false,
        }
    }

    async fn wait_after(&self, attempt: u32) {
        self.sleeper.sleep(Self::schedule().delay(attempt + 1)).await;
    }

    /// Run `job` against `portal`, re-authenticating on session loss
    pub async fn run<P, J>(
        &self,
        portal: &P,
        credentials: &Credentials,
        base_url: &str,
        job: &mut J,
    ) -> E2eResult<()>
    where
        P: SessionControl + ?Sized,
        J: RestartableJob<P>,
    {
        let operation = job.name().to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;
            job.reset();

            let err = match job.run(portal).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(operation = %operation, attempt, "Recovered after session loss");
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            if !is_session_error(&err) {
                debug!("Non-session error in {}: {}", operation, err);
                return Err(err);
            }

            let last_attempt = attempt >= self.max_retries;

            match recover(portal, credentials, base_url).await {
                Ok(true) => {
                    info!("Re-authentication successful. Retrying {}...", operation);
                    if last_attempt {
                        return Err(err);
                    }
                    self.wait_after(attempt).await;
                    continue;
                }
                Ok(false) => {}
                Err(auth_error) => {
                    error!("Re-authentication failed: {}", auth_error);
                    if last_attempt {
                        return Err(E2eError::SessionExpired {
                            operation,
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                }
            }

            if last_attempt {
                return Err(err);
            }
            warn!(
                operation = %operation,
                attempt,
                max_retries = self.max_retries,
                error = %err,
                "Retrying after session error"
            );
            self.wait_after(attempt).await;
        }
    }
}

/// Re-authenticate when logged out. `Ok(false)` means the session looked
/// intact.
async fn recover<P: SessionControl + ?Sized>(
    portal: &P,
    credentials: &Credentials,
    base_url: &str,
) -> E2eResult<bool> {
    if !portal.is_logged_out().await? {
        return Ok(false);
    }
    warn!("Session expired. Re-authenticating...");
    portal.re_authenticate(credentials, base_url).await?;
    Ok(true)
}
