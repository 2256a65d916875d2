//! Shared response store with single-flight generation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::cache::entry::CacheEntry;
use crate::cache::key::CacheKey;
use crate::config::CacheConfig;
use crate::generator::GenerationError;
use crate::http::Response;
use crate::observability::metrics;

type Outcome = Result<Arc<Response>, GenerationError>;

/// A full cache evicts `max_entries / EVICTION_BATCH_DIVISOR` entries at once.
const EVICTION_BATCH_DIVISOR: usize = 16;

/// How a response was obtained from [`ResponseCache::get_or_generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Served from a stored entry.
    Hit,
    /// This caller ran the generator.
    Miss,
    /// Another caller was already generating; its result was reused.
    Shared,
}

impl Lookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lookup::Hit => "hit",
            Lookup::Miss => "miss",
            Lookup::Shared => "shared",
        }
    }
}

/// Counters describing cache behaviour since startup.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    shared: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub shared: u64,
    pub evictions: u64,
}

enum Role {
    Ready(Arc<Response>),
    Leader(watch::Sender<Option<Outcome>>),
    Follower(watch::Receiver<Option<Outcome>>),
}

/// Process-wide key → response store.
///
/// Entries live in a sharded [`DashMap`]. Concurrent misses on one key are
/// collapsed: the first caller generates, the rest wait on a watch channel
/// registered in `in_flight` and receive the same outcome. Failures are
/// handed to waiters but never stored.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    in_flight: DashMap<CacheKey, watch::Receiver<Option<Outcome>>>,
    max_entries: usize,
    ttl: Option<Duration>,
    clock: AtomicU64,
    stats: CacheStats,
}

impl ResponseCache {
    /// `max_entries` of 0 disables the size bound; `ttl` of `None` disables expiry.
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            max_entries,
            ttl,
            clock: AtomicU64::new(0),
            stats: CacheStats::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl = (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs));
        Self::new(config.max_entries, ttl)
    }

    /// Look up a live entry, marking it as recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Response>> {
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(self.ttl) {
                entry.touch(self.tick());
                return Some(Arc::clone(entry.response()));
            }
        }
        // The read guard is released before taking the shard write lock.
        self.entries.remove_if(key, |_, entry| entry.is_expired(self.ttl));
        None
    }

    /// Store a response, replacing any previous entry (last writer wins).
    pub fn put(&self, key: CacheKey, response: Response) {
        self.insert(key, Arc::new(response));
    }

    /// Return the cached response for `key`, or run `generate` to produce it.
    ///
    /// At most one `generate` runs per key at a time. If the generating
    /// caller is cancelled, one of the waiters takes over.
    pub async fn get_or_generate<F, Fut>(
        &self,
        key: &CacheKey,
        generate: F,
    ) -> Result<(Arc<Response>, Lookup), GenerationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, GenerationError>>,
    {
        let tx = loop {
            if let Some(response) = self.get(key) {
                return Ok(self.hit(response));
            }
            match self.join_or_lead(key) {
                Role::Ready(response) => return Ok(self.hit(response)),
                Role::Leader(tx) => break tx,
                Role::Follower(rx) => {
                    if let Some(outcome) = wait_for_leader(rx).await {
                        metrics::record_cache_lookup(Lookup::Shared.as_str());
                        self.stats.shared.fetch_add(1, Ordering::Relaxed);
                        return outcome.map(|response| (response, Lookup::Shared));
                    }
                    // Leader went away without an outcome; try again.
                }
            }
        };

        let slot = InFlightSlot {
            in_flight: &self.in_flight,
            key,
        };
        metrics::record_cache_lookup(Lookup::Miss.as_str());
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let outcome: Outcome = generate().await.map(Arc::new);
        if let Ok(response) = &outcome {
            self.insert(key.clone(), Arc::clone(response));
        }
        // Unregister before publishing, so callers arriving after a failure
        // start a fresh generation instead of joining the finished one.
        drop(slot);
        let _ = tx.send(Some(outcome.clone()));
        outcome.map(|response| (response, Lookup::Miss))
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(self.ttl));
        let removed = before.saturating_sub(self.entries.len());
        metrics::record_cache_size(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            shared: self.stats.shared.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    fn hit(&self, response: Arc<Response>) -> (Arc<Response>, Lookup) {
        metrics::record_cache_lookup(Lookup::Hit.as_str());
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        (response, Lookup::Hit)
    }

    fn join_or_lead(&self, key: &CacheKey) -> Role {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(slot) => Role::Follower(slot.get().clone()),
            Entry::Vacant(slot) => {
                // A leader may have stored its result and left between our
                // miss and taking this slot.
                if let Some(response) = self.get(key) {
                    return Role::Ready(response);
                }
                let (tx, rx) = watch::channel(None);
                slot.insert(rx);
                Role::Leader(tx)
            }
        }
    }

    fn insert(&self, key: CacheKey, response: Arc<Response>) {
        self.entries.insert(key, CacheEntry::new(response, self.tick()));
        if self.max_entries > 0 && self.entries.len() > self.max_entries {
            self.evict_lru();
        }
        metrics::record_cache_size(self.entries.len());
    }

    /// Drop least recently used entries until the cache is within bounds.
    ///
    /// Evicts in batches of at least 1/16 of capacity, so a full cache scans
    /// its entries once per batch rather than on every insert.
    fn evict_lru(&self) {
        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return;
        }
        let batch = excess.max(self.max_entries / EVICTION_BATCH_DIVISOR);

        let mut candidates: Vec<(CacheKey, u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_used()))
            .collect();
        let batch = batch.min(candidates.len());
        if batch < candidates.len() {
            candidates.select_nth_unstable_by_key(batch, |(_, last_used)| *last_used);
        }

        let mut evicted = 0;
        for (key, _) in candidates.into_iter().take(batch) {
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }

        self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        metrics::record_cache_evictions(evicted);
        tracing::debug!(evicted, remaining = self.entries.len(), "Evicted least recently used entries");
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}

/// Wait for the leader's outcome. `None` means the leader was dropped first.
async fn wait_for_leader(mut rx: watch::Receiver<Option<Outcome>>) -> Option<Outcome> {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => (*value).clone(),
        Err(_) => None,
    }
}

/// Removes the in-flight marker when the leader finishes or is cancelled.
struct InFlightSlot<'a> {
    in_flight: &'a DashMap<CacheKey, watch::Receiver<Option<Outcome>>>,
    key: &'a CacheKey,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(self.key);
    }
}
