//! Bearer token lifecycle

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Server-side token lifetime
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before they expire
pub const REFRESH_BUFFER_SECS: i64 = 300;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// An issued API token. Replaced on refresh, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    /// Token issued at `now` with the standard lifetime
    pub fn issue(value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: now + Duration::seconds(TOKEN_LIFETIME_SECS),
        }
    }

    /// Token from a login response `Authorization` value, with any
    /// `Bearer ` prefix removed
    pub fn from_authorization(header: &str, now: DateTime<Utc>) -> Self {
        let value = header.strip_prefix("Bearer ").unwrap_or(header);
        Self::issue(value, now)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// False once fewer than [`REFRESH_BUFFER_SECS`] remain
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now >= Duration::seconds(REFRESH_BUFFER_SECS)
    }
}
