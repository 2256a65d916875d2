//! Request framing on top of a raw byte stream.
//!
//! # Responsibilities
//! - Buffer bytes until the `\r\n\r\n` header terminator arrives
//! - Parse the head to learn the declared body length
//! - Read exactly that many body bytes, keeping any surplus for the next frame
//! - Enforce header/body size limits and a per-frame read deadline

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

use crate::config::{LimitsConfig, TimeoutConfig};
use crate::http::request::{find_head_end, parse_head, ParseError, Request, RequestHead};

/// Bytes reserved in the buffer before each socket read.
const READ_CHUNK: usize = 8192;

/// Why a frame could not be produced.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the connection before a complete head arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Head or declared body exceeds the configured limits.
    #[error("request exceeds size limits")]
    RequestTooLarge,

    /// The frame did not complete before the read deadline.
    #[error("timed out waiting for request")]
    RequestTimeout,

    /// The bytes received do not form a valid request.
    #[error("malformed request: {0}")]
    Malformed(#[from] ParseError),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Limits applied while framing a request.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
    pub read_timeout: Duration,
}

impl FrameLimits {
    pub fn from_config(limits: &LimitsConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            max_header_bytes: limits.max_header_bytes,
            max_body_bytes: limits.max_body_bytes,
            read_timeout: Duration::from_secs(timeouts.read_secs),
        }
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default(), &TimeoutConfig::default())
    }
}

/// One complete request as delimited by its head and declared body length.
#[derive(Debug)]
pub struct Frame {
    head: RequestHead,
    body: Vec<u8>,
}

impl Frame {
    pub fn into_request(self) -> Request {
        self.head.into_request(self.body)
    }
}

/// Reads framed requests from one connection.
///
/// The buffer is owned by the reader and never shared. Bytes past the end of
/// a frame stay buffered for the next call.
pub struct ConnectionReader<S> {
    stream: S,
    buf: Vec<u8>,
    limits: FrameLimits,
}

impl<S: AsyncRead + Unpin> ConnectionReader<S> {
    pub fn new(stream: S, limits: FrameLimits) -> Self {
        Self {
            stream,
            buf: Vec::with_capacity(READ_CHUNK),
            limits,
        }
    }

    /// Read the next complete request frame.
    pub async fn read_frame(&mut self) -> Result<Frame, FrameError> {
        let deadline = Instant::now() + self.limits.read_timeout;

        let mut scanned = 0;
        let head_end = loop {
            if let Some(pos) = find_head_end(&self.buf[scanned..]) {
                break scanned + pos;
            }
            if self.buf.len() >= self.limits.max_header_bytes {
                return Err(FrameError::RequestTooLarge);
            }
            // The terminator may straddle two reads.
            scanned = self.buf.len().saturating_sub(3);
            if self.fill(deadline).await? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        };
        if head_end > self.limits.max_header_bytes {
            return Err(FrameError::RequestTooLarge);
        }

        let head = parse_head(&self.buf[..head_end])?;
        let length = head.content_length()?.unwrap_or(0);
        if length > self.limits.max_body_bytes {
            return Err(FrameError::RequestTooLarge);
        }

        let frame_end = head_end + length;
        while self.buf.len() < frame_end {
            if self.fill(deadline).await? == 0 {
                return Err(ParseError::IncompleteBody.into());
            }
        }

        let body = self.buf[head_end..frame_end].to_vec();
        self.buf.drain(..frame_end);
        Ok(Frame { head, body })
    }

    /// Bytes received past the last frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn fill(&mut self, deadline: Instant) -> Result<usize, FrameError> {
        self.buf.reserve(READ_CHUNK);
        match tokio::time::timeout_at(deadline, self.stream.read_buf(&mut self.buf)).await {
            Ok(read) => Ok(read?),
            Err(_) => Err(FrameError::RequestTimeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn limits() -> FrameLimits {
        FrameLimits {
            max_header_bytes: 1024,
            max_body_bytes: 64,
            read_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn reads_headers_only_request() {
        let mut reader = ConnectionReader::new(&b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n"[..], limits());
        let request = reader.read_frame().await.unwrap().into_request();
        assert_eq!(request.path(), "/hello");
        assert!(request.body().is_empty());
    }

    #[tokio::test]
    async fn reads_exact_body_and_keeps_surplus() {
        let input = b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /b HTTP/1.1\r\n\r\n";
        let mut reader = ConnectionReader::new(&input[..], limits());

        let first = reader.read_frame().await.unwrap().into_request();
        assert_eq!(first.body(), b"abc");

        let second = reader.read_frame().await.unwrap().into_request();
        assert_eq!(second.path(), "/b");
        assert!(reader.buffered().is_empty());
    }

    #[tokio::test]
    async fn body_split_across_reads() {
        let (client, server) = tokio::io::duplex(64);
        let mut reader = ConnectionReader::new(server, limits());

        let writer = tokio::spawn(async move {
            let mut client = client;
            client
                .write_all(b"PUT /x HTTP/1.1\r\nContent-Le")
                .await
                .unwrap();
            tokio::task::yield_now().await;
            client.write_all(b"ngth: 4\r\n\r\nda").await.unwrap();
            tokio::task::yield_now().await;
            client.write_all(b"ta").await.unwrap();
            client
        });

        let request = reader.read_frame().await.unwrap().into_request();
        assert_eq!(request.body(), b"data");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn closed_mid_head_is_connection_closed() {
        let mut reader = ConnectionReader::new(&b"GET /hello HTTP/1.1\r\nHo"[..], limits());
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn closed_mid_body_is_malformed() {
        let mut reader =
            ConnectionReader::new(&b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc"[..], limits());
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::Malformed(ParseError::IncompleteBody))
        ));
    }

    #[tokio::test]
    async fn oversized_head_is_rejected() {
        let mut input = b"GET / HTTP/1.1\r\nX-Fill: ".to_vec();
        input.extend(std::iter::repeat(b'a').take(2048));
        input.extend_from_slice(b"\r\n\r\n");
        let mut reader = ConnectionReader::new(&input[..], limits());
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::RequestTooLarge)
        ));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_reading_it() {
        let mut reader =
            ConnectionReader::new(&b"POST / HTTP/1.1\r\nContent-Length: 65\r\n\r\n"[..], limits());
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::RequestTooLarge)
        ));
    }

    #[tokio::test]
    async fn malformed_line_is_reported_without_body() {
        let mut reader = ConnectionReader::new(&b"GET HTTP/1.1\r\n\r\n"[..], limits());
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::Malformed(ParseError::MalformedRequestLine))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_peer_times_out() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = ConnectionReader::new(
            server,
            FrameLimits {
                read_timeout: Duration::from_secs(1),
                ..limits()
            },
        );
        assert!(matches!(
            reader.read_frame().await,
            Err(FrameError::RequestTimeout)
        ));
    }
}
