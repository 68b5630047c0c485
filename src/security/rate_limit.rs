//! Fixed-window rate limiting.
//!
//! # Responsibilities
//! - Count requests per opaque identifier within a fixed window
//! - Report remaining budget and window reset time
//! - Render `X-RateLimit-*` and `Retry-After` headers
//!
//! # Design Decisions
//! - Fixed window, not sliding: up to 2x `max_requests` can pass across a window
//!   boundary. This is part of the observable contract.
//! - The counter is incremented before the comparison, so the request that crosses the
//!   limit is itself rejected
//! - Expiry is lazy (on the next check for that identifier); nothing sweeps the table
//! - The limiter sits behind the `RateLimiter` trait so a shared store can replace the
//!   in-process map without touching call sites

use std::sync::Arc;

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::http::error::{ApiError, ErrorCode};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// A request budget: `max_requests` per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }
}

/// Outcome of one `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Window end, epoch milliseconds.
    pub reset_time: u64,
}

impl RateLimitDecision {
    /// Seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_time.saturating_sub(now_ms).div_ceil(1000).max(1)
    }

    fn reset_epoch_secs(&self) -> u64 {
        self.reset_time.div_ceil(1000)
    }
}

pub trait RateLimiter: Send + Sync {
    /// Count one request for `identifier` and decide whether it may proceed.
    fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitDecision;

    /// Current time on the limiter's clock, epoch milliseconds.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_time: u64,
}

/// In-process fixed-window limiter backed by a sharded concurrent map.
pub struct FixedWindowLimiter {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of identifiers currently tracked, expired ones included.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitDecision {
        let now = self.clock.now_ms();
        let fresh = RateLimitEntry {
            count: 0,
            reset_time: now.saturating_add(config.window_ms),
        };

        // The shard lock is held for the whole read-modify-write.
        let mut entry = self
            .entries
            .entry(identifier.to_string())
            .or_insert(fresh);
        if entry.reset_time < now {
            *entry = fresh;
        }
        entry.count = entry.count.saturating_add(1);

        RateLimitDecision {
            allowed: entry.count <= config.max_requests,
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(entry.count),
            reset_time: entry.reset_time,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// Write `X-RateLimit-Limit/-Remaining/-Reset`. Reset is in epoch seconds.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_epoch_secs()));
}

/// The 429 sent to a caller that exhausted its window.
pub fn rate_limited_response(decision: &RateLimitDecision, now_ms: u64) -> Response {
    let retry_after = decision.retry_after_secs(now_ms);
    let mut response = ApiError::new(ErrorCode::RateLimitExceeded)
        .with_details(serde_json::json!({
            "limit": decision.limit,
            "retryAfter": retry_after,
        }))
        .with_retry_after(retry_after)
        .into_response();
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use axum::http::{header, StatusCode};

    const START: u64 = 1_700_000_000_000;

    fn limiter() -> (FixedWindowLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        (FixedWindowLimiter::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let (limiter, _clock) = limiter();
        let config = RateLimitConfig::new(30, 60_000);

        for i in 1..=30u32 {
            let d = limiter.check("10.0.0.1", &config);
            assert!(d.allowed, "call {i} should be allowed");
            assert_eq!(d.remaining, 30 - i);
            assert_eq!(d.reset_time, START + 60_000);
        }

        let d = limiter.check("10.0.0.1", &config);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let (limiter, clock) = limiter();
        let config = RateLimitConfig::new(2, 1_000);

        assert!(limiter.check("a", &config).allowed);
        assert!(limiter.check("a", &config).allowed);
        assert!(!limiter.check("a", &config).allowed);

        // Still inside the window at exactly reset_time.
        clock.advance(1_000);
        assert!(!limiter.check("a", &config).allowed);

        clock.advance(1);
        let d = limiter.check("a", &config);
        assert!(d.allowed);
        assert_eq!(d.remaining, 1);
        assert_eq!(d.reset_time, START + 1_001 + 1_000);
    }

    #[test]
    fn test_boundary_double_burst() {
        let (limiter, clock) = limiter();
        let config = RateLimitConfig::new(5, 10_000);

        // One call opens the window, four more land just before it closes.
        assert!(limiter.check("burst", &config).allowed);
        clock.advance(9_999);
        for _ in 0..4 {
            assert!(limiter.check("burst", &config).allowed);
        }
        assert!(!limiter.check("burst", &config).allowed);

        // Two milliseconds later a fresh window admits a full budget again.
        clock.advance(2);
        for _ in 0..5 {
            assert!(limiter.check("burst", &config).allowed);
        }
        assert!(!limiter.check("burst", &config).allowed);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let (limiter, _clock) = limiter();
        let config = RateLimitConfig::new(1, 60_000);

        assert!(limiter.check("plugin:revit:user:u1", &config).allowed);
        assert!(!limiter.check("plugin:revit:user:u1", &config).allowed);
        assert!(limiter.check("plugin:revit:ip:10.0.0.1", &config).allowed);
        assert!(limiter.check("plugin:blender:user:u1", &config).allowed);
        assert_eq!(limiter.tracked(), 3);
    }

    #[test]
    fn test_concurrent_checks_never_overshoot() {
        let limiter = Arc::new(FixedWindowLimiter::new());
        let config = RateLimitConfig::new(100, 60_000);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.check("shared", &config).allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100);
    }

    #[test]
    fn test_retry_after_bounds() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 30,
            remaining: 0,
            reset_time: START + 60_000,
        };
        assert_eq!(decision.retry_after_secs(START), 60);
        assert_eq!(decision.retry_after_secs(START + 59_500), 1);
        assert_eq!(decision.retry_after_secs(START + 61_000), 1);
    }

    #[test]
    fn test_rate_limited_response_headers() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 30,
            remaining: 0,
            reset_time: START + 60_000,
        };
        let response = rate_limited_response(&decision, START + 15_000);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "45");
        assert_eq!(response.headers()[X_RATELIMIT_LIMIT], "30");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");
        assert_eq!(
            response.headers()[X_RATELIMIT_RESET],
            ((START + 60_000) / 1000).to_string().as_str()
        );
    }
}
