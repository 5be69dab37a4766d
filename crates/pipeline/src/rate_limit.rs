//! Per-client, per-endpoint request admission.
//!
//! Two expiring counters per `(client, endpoint)`: a 60 s window and a
//! 3600 s window. Both are incremented on every check; the minute limit
//! is evaluated first. If the store is unreachable the request is allowed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::outcome::Outcome;
use crate::store::Store;

/// Namespace for rate counters.
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit:";

/// Default requests allowed per client/endpoint per minute.
pub const DEFAULT_PER_MINUTE: u64 = 60;

/// Default requests allowed per client/endpoint per hour.
pub const DEFAULT_PER_HOUR: u64 = 1000;

/// A counting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Minute,
    Hour,
}

impl Window {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
        }
    }

    pub fn length(self) -> Duration {
        match self {
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3600),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(Window),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u64,
    pub requests_per_hour: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_PER_MINUTE,
            requests_per_hour: DEFAULT_PER_HOUR,
        }
    }
}

pub struct RateLimiter {
    store: Arc<dyn Store>,
    config: RateLimitConfig,
}

fn counter_key(window: Window, client_id: &str, endpoint_key: &str) -> String {
    format!("{RATE_LIMIT_KEY_PREFIX}{window}:{client_id}:{endpoint_key}")
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Count this request and decide whether to admit it.
    pub async fn check(&self, client_id: &str, endpoint_key: &str) -> Admission {
        let minute = self.hit(Window::Minute, client_id, endpoint_key).await;
        let hour = self.hit(Window::Hour, client_id, endpoint_key).await;

        let (Outcome::Ok(minute), Outcome::Ok(hour)) = (minute, hour) else {
            tracing::warn!(client_id, endpoint_key, "Rate limit store unavailable, allowing request");
            return Admission::Allow;
        };

        if minute > self.config.requests_per_minute {
            tracing::warn!(client_id, endpoint_key, count = minute, "Rate limit exceeded (minute)");
            Admission::Deny(Window::Minute)
        } else if hour > self.config.requests_per_hour {
            tracing::warn!(client_id, endpoint_key, count = hour, "Rate limit exceeded (hour)");
            Admission::Deny(Window::Hour)
        } else {
            Admission::Allow
        }
    }

    /// Increment one window's counter, arming its expiry on first use.
    async fn hit(&self, window: Window, client_id: &str, endpoint_key: &str) -> Outcome<u64> {
        let key = counter_key(window, client_id, endpoint_key);
        let count = match Outcome::from_store("rate_limit.incr", self.store.incr(&key).await) {
            Outcome::Ok(count) => count,
            Outcome::Degraded(reason) => return Outcome::Degraded(reason),
        };
        if count == 1 {
            if let Outcome::Degraded(reason) = Outcome::from_store(
                "rate_limit.expire",
                self.store.expire(&key, window.length()).await,
            ) {
                return Outcome::Degraded(reason);
            }
        }
        Outcome::Ok(u64::try_from(count).unwrap_or(0))
    }
}
