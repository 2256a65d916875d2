//! Cache entry with access bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::http::Response;

/// A stored response. The response itself is never mutated after insertion;
/// only the last-use stamp changes.
#[derive(Debug)]
pub struct CacheEntry {
    response: Arc<Response>,
    created_at: Instant,
    /// Logical clock value of the most recent hit, for LRU ordering.
    last_used: AtomicU64,
}

impl CacheEntry {
    pub fn new(response: Arc<Response>, tick: u64) -> Self {
        Self {
            response,
            created_at: Instant::now(),
            last_used: AtomicU64::new(tick),
        }
    }

    pub fn response(&self) -> &Arc<Response> {
        &self.response
    }

    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    pub fn touch(&self, tick: u64) {
        self.last_used.fetch_max(tick, Ordering::Relaxed);
    }

    /// `ttl` of `None` means entries never expire.
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }
}
