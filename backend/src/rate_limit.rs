//! In-memory sliding-window rate limiter.
//!
//! Limits are per process. Several instances behind a load balancer each keep
//! their own counts, which is acceptable for low-traffic deployments.

use dashmap::DashMap;

use crate::clock::SharedClock;
use crate::error::AppError;

/// Once the map holds more keys than this, stale keys are swept on the next check.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub limited: bool,
    /// Seconds until the oldest request in the window expires.
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitResult {
    const ALLOWED: Self = Self {
        limited: false,
        retry_after_seconds: None,
    };
}

/// A named limit applied to one subject (an IP or an identity) per request.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub scope: &'static str,
    pub max_requests: usize,
    pub window_seconds: u64,
    pub message: &'static str,
}

pub const SEND_OTP_PER_IP: RateLimitPolicy = RateLimitPolicy {
    scope: "send-otp",
    max_requests: 10,
    window_seconds: 15 * 60,
    message: "Too many requests. Please wait before trying again.",
};

pub const SEND_OTP_PER_IDENTITY: RateLimitPolicy = RateLimitPolicy {
    scope: "send-otp",
    max_requests: 3,
    window_seconds: 15 * 60,
    message: "Too many requests. Please wait before trying again.",
};

pub const VERIFY_OTP_PER_IDENTITY: RateLimitPolicy = RateLimitPolicy {
    scope: "verify-otp",
    max_requests: 5,
    window_seconds: 10 * 60,
    message: "Too many attempts. Please request a new code and try again.",
};

pub const VERIFY_OTP_PER_IP: RateLimitPolicy = RateLimitPolicy {
    scope: "verify-otp",
    max_requests: 20,
    window_seconds: 10 * 60,
    message: "Too many attempts. Please request a new code and try again.",
};

struct Entry {
    window_ms: i64,
    /// Request timestamps in ms since the epoch, oldest first.
    hits: Vec<i64>,
}

pub struct RateLimiter {
    entries: DashMap<String, Entry>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Check (and record) a request against a limit.
    ///
    /// The shard lock on `key` is held from pruning to recording, so two
    /// concurrent calls can never both slip under the limit.
    pub fn check(&self, key: &str, max_requests: usize, window_seconds: u64) -> RateLimitResult {
        let now = self.clock.utc().timestamp_millis();
        let window_ms = i64::try_from(window_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1_000);

        if self.entries.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }

        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            window_ms,
            hits: Vec::new(),
        });
        entry.window_ms = window_ms;

        let window_start = now.saturating_sub(window_ms);
        entry.hits.retain(|&t| t > window_start);

        if entry.hits.len() >= max_requests {
            let oldest = entry.hits.iter().copied().min().unwrap_or(now);
            let retry_after_ms = oldest.saturating_add(window_ms) - now;
            let seconds = u64::try_from((retry_after_ms + 999) / 1_000).unwrap_or(1);
            return RateLimitResult {
                limited: true,
                retry_after_seconds: Some(seconds.max(1)),
            };
        }

        entry.hits.push(now);
        RateLimitResult::ALLOWED
    }

    /// Apply `policy` to `subject`, turning a trip into [`AppError::RateLimited`].
    pub fn enforce(&self, policy: RateLimitPolicy, subject: &str) -> Result<(), AppError> {
        let key = format!("{}:{subject}", policy.scope);
        let result = self.check(&key, policy.max_requests, policy.window_seconds);

        match result.retry_after_seconds {
            Some(retry_after_seconds) if result.limited => {
                tracing::warn!(scope = policy.scope, retry_after_seconds, "rate limit exceeded");
                Err(AppError::RateLimited {
                    message: policy.message,
                    retry_after_seconds,
                })
            }
            _ => Ok(()),
        }
    }

    /// Drop keys whose newest request has left their window.
    fn sweep(&self, now: i64) {
        self.entries.retain(|_, entry| {
            let window_start = now.saturating_sub(entry.window_ms);
            entry.hits.iter().any(|&t| t > window_start)
        });
    }

    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.entries.len()
    }
}
