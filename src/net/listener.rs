//! Bounded TCP accept.
//!
//! A semaphore caps how many connections are handled at once. When every
//! slot is taken, `accept` stops pulling from the kernel backlog until a
//! connection task drops its [`Accepted`].

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// The connection limiter was closed.
    #[error("connection limiter closed")]
    Closed,
}

pub struct Listener {
    inner: TcpListener,
    slots: Arc<Semaphore>,
}

/// An accepted connection together with the slot it occupies.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    slot: OwnedSemaphorePermit,
}

impl Accepted {
    /// Split off the stream; the returned slot must live as long as it does.
    pub fn into_parts(self) -> (TcpStream, SocketAddr, OwnedSemaphorePermit) {
        (self.stream, self.peer, self.slot)
    }
}

impl Listener {
    /// Bind `listener.bind_address`; host names such as `localhost` are
    /// resolved.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let inner = TcpListener::bind(config.bind_address.as_str())
            .await
            .map_err(ListenerError::Bind)?;
        Ok(Self::new(inner, config.max_connections))
    }

    pub fn new(inner: TcpListener, max_connections: usize) -> Self {
        if let Ok(addr) = inner.local_addr() {
            tracing::info!(address = %addr, max_connections, "Listener bound");
        }
        Self {
            inner,
            slots: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Wait for a free slot, then for the next connection.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;
        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %peer,
            free_slots = self.slots.available_permits(),
            "Connection accepted"
        );
        Ok(Accepted { stream, peer, slot })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slot_is_released_with_the_connection() {
        let listener = Listener::new(TcpListener::bind("127.0.0.1:0").await.unwrap(), 2);
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let accepted = listener.accept().await.unwrap();
        assert_eq!(listener.free_slots(), 1);
        assert_eq!(accepted.peer.ip(), addr.ip());

        drop(accepted);
        assert_eq!(listener.free_slots(), 2);
    }

    #[tokio::test]
    async fn full_listener_waits_for_a_slot() {
        let listener = Listener::new(TcpListener::bind("127.0.0.1:0").await.unwrap(), 1);
        let addr = listener.local_addr().unwrap();

        let _first = TcpStream::connect(addr).await.unwrap();
        let held = listener.accept().await.unwrap();
        let _second = TcpStream::connect(addr).await.unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            listener.accept(),
        )
        .await;
        assert!(blocked.is_err());

        drop(held);
        assert!(listener.accept().await.is_ok());
    }

    #[tokio::test]
    async fn bind_resolves_host_names() {
        let config = ListenerConfig {
            bind_address: "localhost:0".into(),
            max_connections: 4,
        };
        let listener = Listener::bind(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
