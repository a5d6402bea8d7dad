//! Per-client rate limiting.
//!
//! Fixed-window counters keyed by client identity. The limiter is injected
//! into the API state behind the [`RateLimiter`] trait so the in-memory store
//! can be replaced by a shared one in multi-process deployments.
//!
//! # Example
//!
//! ```
//! use keybroker::config::RateLimitConfig;
//! use keybroker::rate_limit::{FixedWindowLimiter, RateLimitDecision};
//! use std::time::Instant;
//!
//! let limiter = FixedWindowLimiter::new(&RateLimitConfig {
//!     max_requests: 2,
//!     ..Default::default()
//! });
//! let now = Instant::now();
//!
//! assert!(limiter.check_and_consume_at("10.0.0.1", now).is_allowed());
//! assert!(limiter.check_and_consume_at("10.0.0.1", now).is_allowed());
//! assert!(matches!(
//!     limiter.check_and_consume_at("10.0.0.1", now),
//!     RateLimitDecision::Denied { retry_after_seconds: 900 }
//! ));
//! ```

mod identity;

pub use identity::{client_identity, UNKNOWN_IDENTITY};

use crate::config::RateLimitConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Verdict for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request may proceed; `remaining` requests are left in this window
    Allowed { remaining: u32 },
    /// Quota exhausted until the window resets
    Denied { retry_after_seconds: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Storage-agnostic rate limiter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request against `identity` and decide whether it may proceed.
    ///
    /// Check and increment are atomic per identity.
    async fn check_and_consume(&self, identity: &str) -> RateLimitDecision;

    /// Requests allowed per window, reported in response headers.
    fn limit(&self) -> u32;
}

/// Counter state for one identity.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// In-memory fixed-window limiter.
///
/// Each identity gets a window that starts with its first request. Bursts at
/// window boundaries are accepted; memory is O(1) per active identity.
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: DashMap<String, WindowState>,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(config.window(), config.max_requests)
    }

    pub fn with_limits(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: DashMap::new(),
        }
    }

    /// Check and consume at an explicit instant.
    pub fn check_and_consume_at(&self, identity: &str, now: Instant) -> RateLimitDecision {
        // The entry guard holds the shard write lock for the whole
        // read-modify-write, so concurrent callers for one identity serialize.
        let mut state = self
            .windows
            .entry(identity.to_string())
            .or_insert(WindowState {
                window_start: now,
                count: 0,
            });

        // A window covers [start, start + window]; it expires strictly after.
        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed > self.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count < self.max_requests {
            state.count += 1;
            return RateLimitDecision::Allowed {
                remaining: self.max_requests - state.count,
            };
        }

        let elapsed = now.saturating_duration_since(state.window_start);
        let left = self.window.saturating_sub(elapsed);
        RateLimitDecision::Denied {
            retry_after_seconds: ceil_secs(left).max(1),
        }
    }

    /// Drop windows that have expired as of `now`. Returns how many were removed.
    ///
    /// An expired window would be reset on the identity's next request anyway,
    /// so purging never changes a decision.
    pub fn purge_idle(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, state| now.saturating_duration_since(state.window_start) <= self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Periodically purge expired windows until `cancel_token` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("rate limit sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = limiter.purge_idle(Instant::now());
                        if purged > 0 {
                            tracing::debug!(
                                purged,
                                tracked = limiter.tracked_identities(),
                                "purged expired rate limit windows"
                            );
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check_and_consume(&self, identity: &str) -> RateLimitDecision {
        self.check_and_consume_at(identity, Instant::now())
    }

    fn limit(&self) -> u32 {
        self.max_requests
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
