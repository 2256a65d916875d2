//! Request parsing.
//!
//! # Responsibilities
//! - Parse the request line into method, target and version
//! - Parse header lines into an ordered, case-insensitive map
//! - Determine the declared body length from `Content-Length`
//!
//! # Design Decisions
//! - Strict request line: exactly three single-space-separated tokens
//! - Repeated header names are combined (`a, b`) into the first occurrence
//! - A parsed `Request` is immutable; all fields are behind accessors

use thiserror::Error;

use crate::http::headers::{is_token_byte, is_valid_value, Headers};

/// Errors raised while turning a frame into a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Request line is not `METHOD SP target SP HTTP/1.x`.
    #[error("malformed request line")]
    MalformedRequestLine,

    /// A header line lacks a colon or carries an invalid name or value.
    #[error("malformed header line")]
    MalformedHeaderLine,

    /// `Content-Length` is not a decimal integer or has conflicting values.
    #[error("invalid Content-Length")]
    InvalidContentLength,

    /// The request uses `Transfer-Encoding`, which this server cannot frame.
    #[error("unsupported Transfer-Encoding")]
    UnsupportedTransferEncoding,

    /// The peer closed the connection before the declared body arrived.
    #[error("connection closed before the declared body was received")]
    IncompleteBody,
}

impl ParseError {
    /// Status code and reason phrase sent back for this failure.
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            ParseError::UnsupportedTransferEncoding => (501, "Not Implemented"),
            _ => (400, "Bad Request"),
        }
    }
}

/// The request line and headers of a request, before its body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    method: String,
    target: String,
    version: String,
    headers: Headers,
}

impl RequestHead {
    /// Declared body length; `None` when no `Content-Length` is present.
    pub fn content_length(&self) -> Result<Option<usize>, ParseError> {
        if self.headers.contains("transfer-encoding") {
            return Err(ParseError::UnsupportedTransferEncoding);
        }
        let Some(raw) = self.headers.get("content-length") else {
            return Ok(None);
        };

        // Duplicates were folded into "n, n"; every value must agree.
        let mut length = None;
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::InvalidContentLength);
            }
            let value: usize = part.parse().map_err(|_| ParseError::InvalidContentLength)?;
            match length {
                Some(previous) if previous != value => {
                    return Err(ParseError::InvalidContentLength)
                }
                _ => length = Some(value),
            }
        }
        Ok(length)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Attach the body and produce the finished request.
    pub fn into_request(self, body: Vec<u8>) -> Request {
        Request { head: self, body }
    }
}

/// A fully parsed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    head: RequestHead,
    body: Vec<u8>,
}

impl Request {
    /// Parse a complete frame (head followed by exactly the declared body).
    pub fn parse(frame: &[u8]) -> Result<Self, ParseError> {
        let head_end = find_head_end(frame).ok_or(ParseError::MalformedRequestLine)?;
        let head = parse_head(&frame[..head_end])?;
        let length = head.content_length()?.unwrap_or(0);
        let body = &frame[head_end..];
        if body.len() < length {
            return Err(ParseError::IncompleteBody);
        }
        Ok(head.into_request(body[..length].to_vec()))
    }

    pub fn method(&self) -> &str {
        &self.head.method
    }

    /// The request target as sent (path plus optional query).
    pub fn target(&self) -> &str {
        &self.head.target
    }

    /// Target up to the first `?`.
    pub fn path(&self) -> &str {
        match self.head.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.head.target,
        }
    }

    /// Query string after the first `?`, if any.
    pub fn query(&self) -> Option<&str> {
        self.head.target.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> &str {
        &self.head.version
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_head(&self) -> bool {
        self.head.method == "HEAD"
    }
}

/// Byte offset just past the `\r\n\r\n` that ends the head, if present.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Parse the request line and header lines.
///
/// `head` may include the terminating blank line; anything after it is
/// ignored.
pub fn parse_head(head: &[u8]) -> Result<RequestHead, ParseError> {
    let head = match find_head_end(head) {
        Some(end) => &head[..end - 4],
        None => head,
    };

    let mut lines = head.split_crlf();
    let request_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;
    let (method, target, version) = parse_request_line(request_line)?;

    let mut headers = Headers::new();
    for line in lines {
        let (name, value) = parse_header_line(line)?;
        headers.append(name, value);
    }

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}

fn parse_request_line(line: &[u8]) -> Result<(String, String, String), ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedRequestLine)?;
    let mut tokens = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::MalformedRequestLine);
    };

    if method.is_empty() || !method.bytes().all(is_token_byte) {
        return Err(ParseError::MalformedRequestLine);
    }
    if target.is_empty() || !target.bytes().all(|b| b.is_ascii_graphic() || b >= 0x80) {
        return Err(ParseError::MalformedRequestLine);
    }
    if !is_http1_version(version) {
        return Err(ParseError::MalformedRequestLine);
    }

    Ok((method.to_string(), target.to_string(), version.to_string()))
}

fn is_http1_version(version: &str) -> bool {
    match version.strip_prefix("HTTP/1.") {
        Some(minor) => minor.len() == 1 && minor.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

fn parse_header_line(line: &[u8]) -> Result<(&str, &str), ParseError> {
    // Obsolete line folding is rejected outright.
    if line.first().is_some_and(|b| *b == b' ' || *b == b'\t') {
        return Err(ParseError::MalformedHeaderLine);
    }
    let line = std::str::from_utf8(line).map_err(|_| ParseError::MalformedHeaderLine)?;
    let (name, value) = line.split_once(':').ok_or(ParseError::MalformedHeaderLine)?;

    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(ParseError::MalformedHeaderLine);
    }
    let value = value.trim();
    if !is_valid_value(value) {
        return Err(ParseError::MalformedHeaderLine);
    }
    Ok((name, value))
}

trait SplitCrlf {
    fn split_crlf(&self) -> CrlfLines<'_>;
}

impl SplitCrlf for [u8] {
    fn split_crlf(&self) -> CrlfLines<'_> {
        CrlfLines { rest: Some(self) }
    }
}

/// Iterator over `\r\n`-separated lines.
struct CrlfLines<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Iterator for CrlfLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match rest.windows(2).position(|w| w == b"\r\n") {
            Some(pos) => {
                self.rest = Some(&rest[pos + 2..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}
