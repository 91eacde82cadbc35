//! Exponential backoff and the sleep seam shared by both retry variants

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

/// Exponential backoff schedule.
///
/// The wait before retry `attempt` (1-indexed) is
/// `min(factor^(attempt-1), max)` seconds, plus up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub factor: f64,
    pub max: f64,
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            factor: 2.0,
            max: 32.0,
            jitter: true,
        }
    }
}

impl Backoff {
    /// Base wait in seconds before jitter
    pub fn base_secs(&self, attempt: u32) -> f64 {
        let exp = attempt.saturating_sub(1) as i32;
        self.factor.powi(exp).min(self.max)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let mut wait = self.base_secs(attempt);
        if self.jitter && wait > 0.0 && wait.is_finite() {
            wait += rand::thread_rng().gen_range(0.0..=wait * 0.1);
        }
        secs_to_duration(wait)
    }

    /// Upper bound on any single wait
    pub fn max_delay(&self) -> Duration {
        secs_to_duration(self.max)
    }
}

/// Seconds as a `Duration`. NaN and non-positive values give zero,
/// values too large to represent saturate.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Suspends the current task between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested sleeps without waiting
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sleeps.lock().len()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}
