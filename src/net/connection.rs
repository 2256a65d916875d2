//! Per-connection identity and accounting.
//!
//! Every connection gets a [`ConnectionGuard`] for as long as it is being
//! handled. The guard carries the `connection_id` used in log spans and keeps
//! the active/served counters and the `active_connections` gauge current.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::metrics;

/// Identifier of one handled connection, unique per tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    next_id: AtomicU64,
    active: AtomicU64,
    served: AtomicU64,
}

/// Shared connection counters. Cloning shares the same counters.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counters: Arc<Counters>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a connection from `peer`.
    pub fn track(&self, peer: SocketAddr) -> ConnectionGuard {
        let id = ConnectionId(self.counters.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_active_connections(active);

        ConnectionGuard {
            counters: Arc::clone(&self.counters),
            id,
            peer,
            opened: Instant::now(),
        }
    }

    /// Connections currently being handled.
    pub fn active_count(&self) -> u64 {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Connections finished since startup.
    pub fn served_count(&self) -> u64 {
        self.counters.served.load(Ordering::SeqCst)
    }
}

/// Live connection. Dropping it closes the books on the connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
    peer: SocketAddr,
    opened: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn age(&self) -> Duration {
        self.opened.elapsed()
    }

    /// Span that every event for this connection is recorded under.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "connection",
            connection_id = %self.id,
            peer_addr = %self.peer
        )
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.counters.active.fetch_sub(1, Ordering::SeqCst) - 1;
        self.counters.served.fetch_add(1, Ordering::SeqCst);
        metrics::record_active_connections(active);
        tracing::trace!(
            connection_id = %self.id,
            duration_ms = self.age().as_millis() as u64,
            "Connection closed"
        );
    }
}
