//! Fixed-window rate limiting backing the `rate_limit` middleware (spec.md
//! §4.4, §8 scenario 4: "fixed-window counter per key").
//!
//! Reworked from a continuous token-bucket refill (the teacher's shape) to
//! window-boundary-reset counting, since the spec names the algorithm
//! explicitly rather than leaving it an implementation choice.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outcome of a single `check` call, carrying everything the `rate_limit`
/// middleware needs to set `X-RateLimit-*`/`Retry-After` headers (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at which the current window resets.
    pub reset_at: u64,
}

/// Pluggable rate-limit backend seam, mirroring `r2e_cache::CacheStore`'s
/// trait-over-in-memory-impl shape: only `FixedWindowLimiter` is in scope
/// (spec.md §1), but a distributed backend (Redis, etc.) would implement
/// this same surface rather than the `rate_limit` middleware reaching for
/// a concrete type. Native `async fn`-in-trait, matching `CacheStore`.
pub trait RateLimitBackend: Send + Sync {
    fn check(&self, key: &str) -> impl std::future::Future<Output = RateLimitDecision> + Send;
    fn cleanup(&self) -> impl std::future::Future<Output = usize> + Send;
}

struct Window {
    /// Unix seconds marking the start of the current fixed window.
    started_at: u64,
    count: u64,
}

/// One independent counter per key, resetting to zero whenever wall-clock
/// time crosses a `window`-sized boundary from when the key's window
/// started (§4.5 "Fixed-window counter per key").
#[derive(Clone)]
pub struct FixedWindowLimiter {
    windows: Arc<DashMap<String, Window>>,
    max: u64,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(max: u64, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max,
            window,
        }
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Consume one unit of the key's current window. Never blocks.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = unix_now();
        let window_secs = self.window.as_secs().max(1);

        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            started_at: now,
            count: 0,
        });

        if now.saturating_sub(entry.started_at) >= window_secs {
            entry.started_at = now;
            entry.count = 0;
        }

        let reset_at = entry.started_at + window_secs;
        if entry.count < self.max {
            entry.count += 1;
            RateLimitDecision {
                allowed: true,
                limit: self.max,
                remaining: self.max - entry.count,
                reset_at,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                limit: self.max,
                remaining: 0,
                reset_at,
            }
        }
    }

    /// Drop windows that have already expired and are unlikely to be
    /// revisited soon, bounding unbounded key growth for a skip_fn-less
    /// deployment that sees ever-changing keys (e.g. per-request UUIDs).
    pub fn cleanup(&self) -> usize {
        let now = unix_now();
        let window_secs = self.window.as_secs().max(1);
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_sub(w.started_at) < window_secs * 2);
        before - self.windows.len()
    }
}

impl RateLimitBackend for FixedWindowLimiter {
    async fn check(&self, key: &str) -> RateLimitDecision {
        FixedWindowLimiter::check(self, key)
    }

    async fn cleanup(&self) -> usize {
        FixedWindowLimiter::cleanup(self)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
