//! Connection dispatcher.
//!
//! # Responsibilities
//! - Accept connections under the configured connection limit
//! - Read one request per connection and answer it exactly once
//! - Serve from the response cache, generating on a miss
//! - Map framing and generation failures to error responses
//! - Periodically sweep expired cache entries and idle rate-limit buckets

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::Instrument;

use crate::cache::{CacheKey, KeyPolicy, ResponseCache};
use crate::config::ServerConfig;
use crate::generator::{ContentGenerator, GeneratorAdapter};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionReader, ConnectionTracker, FrameError, FrameLimits, Listener, ListenerError};
use crate::observability::metrics;
use crate::resilience::bounded;
use crate::security::RateLimiter;

/// Pause after a failed accept, so fd exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bounds for discarding unread request bytes after an error reply.
const LINGER_TIME: Duration = Duration::from_secs(1);
const LINGER_BYTES: usize = 64 * 1024;

/// HTTP server answering every request with generated, cached content.
pub struct HttpServer<G> {
    dispatcher: Arc<Dispatcher<G>>,
    sweep_interval: Option<Duration>,
}

impl<G: ContentGenerator> HttpServer<G> {
    pub fn new(config: &ServerConfig, generator: G) -> Self {
        let dispatcher = Dispatcher {
            cache: Arc::new(ResponseCache::from_config(&config.cache)),
            generator: GeneratorAdapter::from_config(generator, &config.generator, &config.timeouts),
            key_policy: KeyPolicy::from_config(&config.cache),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            frame_limits: FrameLimits::from_config(&config.limits, &config.timeouts),
            write_timeout: Duration::from_secs(config.timeouts.write_secs),
            tracker: ConnectionTracker::new(),
        };
        let sweep_interval = match config.cache.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            dispatcher: Arc::new(dispatcher),
            sweep_interval,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.dispatcher.cache
    }

    pub fn active_connections(&self) -> u64 {
        self.dispatcher.tracker.active_count()
    }

    /// Serve a single already-accepted connection to completion.
    pub async fn handle_connection<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.dispatcher.handle(stream, peer).await;
    }

    /// Run the accept loop until `shutdown` fires.
    ///
    /// Connections already accepted are left to finish on their own tasks.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(every) = self.sweep_interval {
            spawn_sweeper(Arc::clone(&self.dispatcher), every, shutdown.clone());
        }

        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        tokio::spawn(async move {
                            let (stream, peer, slot) = accepted.into_parts();
                            dispatcher.handle(stream, peer).await;
                            drop(slot);
                        });
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// State shared by every connection task.
struct Dispatcher<G> {
    cache: Arc<ResponseCache>,
    generator: GeneratorAdapter<G>,
    key_policy: KeyPolicy,
    rate_limiter: RateLimiter,
    frame_limits: FrameLimits,
    write_timeout: Duration,
    tracker: ConnectionTracker,
}

/// What to send back, and how.
struct Reply {
    response: Arc<Response>,
    head_only: bool,
    /// hit, miss, shared, error, limited or rejected
    source: &'static str,
    /// The request may not have been read in full.
    drain: bool,
}

impl<G: ContentGenerator> Dispatcher<G> {
    async fn handle<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let guard = self.tracker.track(peer);
        self.serve(stream, peer).instrument(guard.span()).await;
    }

    async fn serve<S>(&self, stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let started = Instant::now();
        let mut reader = ConnectionReader::new(stream, self.frame_limits);

        let (reply, request) = match reader.read_frame().await {
            Ok(frame) => {
                let request = frame.into_request();
                (self.answer(&request, peer).await, Some(request))
            }
            Err(FrameError::ConnectionClosed) => {
                tracing::debug!("Connection closed before a request arrived");
                return;
            }
            Err(FrameError::Io(e)) => {
                tracing::debug!(error = %e, "Connection failed while reading");
                return;
            }
            Err(e) => {
                tracing::info!(error = %e, "Rejecting request");
                let reply = Reply {
                    response: Arc::new(rejection(&e)),
                    head_only: false,
                    source: "rejected",
                    drain: true,
                };
                (reply, None)
            }
        };

        let bytes = if reply.head_only {
            reply.response.encode_head()
        } else {
            reply.response.encode()
        };

        let mut stream = reader.into_inner();
        match bounded(self.write_timeout, send(&mut stream, &bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Failed to write response"),
            Err(e) => tracing::warn!(error = %e, "Response write timed out"),
        }

        let status = reply.response.status();
        metrics::record_response(status);
        match &request {
            Some(request) => tracing::info!(
                method = %request.method(),
                target = %request.target(),
                status,
                cache = reply.source,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request served"
            ),
            None => tracing::info!(
                status,
                cache = reply.source,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request rejected"
            ),
        }

        if reply.drain {
            discard_unread(&mut stream).await;
        }
    }

    async fn answer(&self, request: &Request, peer: SocketAddr) -> Reply {
        let head_only = request.is_head();

        if !self.rate_limiter.check(peer.ip()) {
            return Reply {
                response: Arc::new(Response::too_many_requests()),
                head_only,
                source: "limited",
                drain: false,
            };
        }

        let key = CacheKey::derive(request, &self.key_policy);
        match self
            .cache
            .get_or_generate(&key, || self.generator.respond(request))
            .await
        {
            Ok((response, lookup)) => Reply {
                response,
                head_only,
                source: lookup.as_str(),
                drain: false,
            },
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Generation failed");
                Reply {
                    response: Arc::new(Response::bad_gateway()),
                    head_only,
                    source: "error",
                    drain: false,
                }
            }
        }
    }
}

/// Error response for a request that could not be framed.
fn rejection(error: &FrameError) -> Response {
    match error {
        FrameError::RequestTooLarge => Response::payload_too_large(),
        FrameError::RequestTimeout => Response::request_timeout(),
        FrameError::Malformed(e) => match e.status() {
            (400, _) => Response::bad_request(),
            (status, reason) => Response::plain(status, reason, &e.to_string()),
        },
        FrameError::ConnectionClosed | FrameError::Io(_) => Response::bad_request(),
    }
}

async fn send<S: AsyncWrite + Unpin>(stream: &mut S, bytes: &[u8]) -> io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// Read and drop whatever the client still sends, so closing the socket
/// with unread data does not reset the connection before the reply lands.
async fn discard_unread<S: AsyncRead + Unpin>(stream: &mut S) {
    let mut scratch = [0u8; 4096];
    let _ = tokio::time::timeout(LINGER_TIME, async {
        let mut remaining = LINGER_BYTES;
        while remaining > 0 {
            match stream.read(&mut scratch).await {
                Ok(0) | Err(_) => break,
                Ok(n) => remaining = remaining.saturating_sub(n),
            }
        }
    })
    .await;
}

fn spawn_sweeper<G: ContentGenerator>(
    dispatcher: Arc<Dispatcher<G>>,
    every: Duration,
    mut shutdown: ShutdownSignal,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {
                    let expired = dispatcher.cache.sweep_expired();
                    let pruned = dispatcher.rate_limiter.prune();
                    if expired > 0 || pruned > 0 {
                        tracing::debug!(expired, pruned, "Sweep finished");
                    }
                }
            }
        }
    });
}
