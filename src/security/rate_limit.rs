//! Per-client rate limiting.
//!
//! One token bucket per client IP. A request that finds its bucket empty is
//! answered with `429 Too Many Requests` and never reaches the cache or the
//! generator.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Admission control keyed by client IP.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<IpAddr, TokenBucket>,
    enabled: bool,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            enabled: config.enabled,
            rate: config.requests_per_second,
            burst: f64::from(config.burst_size),
        }
    }

    /// Take one token for `client`. Always true when disabled.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }
        let allowed = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst, now))
            .try_acquire(self.burst, self.rate, now);

        if !allowed {
            tracing::warn!(client = %client, "Rate limit exceeded");
            metrics::record_rate_limited();
        }
        allowed
    }

    /// Drop buckets that would be full again, so idle clients do not
    /// accumulate. Returns how many were removed.
    pub fn prune(&self) -> usize {
        if !self.enabled || self.rate.is_nan() || self.rate <= 0.0 {
            return 0;
        }
        // Tiny rates overflow `Duration`; such buckets effectively never refill.
        let refill = Duration::try_from_secs_f64(self.burst / self.rate).unwrap_or(Duration::MAX);
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_update.elapsed() < refill);
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}
