//! Response representation and wire serialization.
//!
//! # Responsibilities
//! - Hold a status, ordered headers and a byte body
//! - Encode to HTTP/1.1 bytes with framing derived from the body
//! - Provide the fixed, non-generated error responses
//!
//! # Design Decisions
//! - `Content-Length` is always computed from the body's byte length;
//!   any stored framing header is ignored
//! - Every response carries `Connection: close` (one request per connection)
//! - Header fields that are not wire-safe are skipped, never escaped

use crate::http::headers::{is_token_byte, is_valid_value, Headers};

/// Headers the serializer owns; values stored on a [`Response`] are ignored.
const FRAMING_HEADERS: &[&str] = &["content-length", "transfer-encoding", "connection"];

/// An HTTP response ready to be cached and serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// `200 OK` carrying `body` with the given content type.
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, "OK")
            .with_header("Content-Type", content_type)
            .with_body(body)
    }

    /// A static plain-text response used for locally handled errors.
    pub fn plain(status: u16, reason: &str, message: &str) -> Self {
        Self::new(status, reason)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(message)
    }

    pub fn bad_request() -> Self {
        Self::plain(400, "Bad Request", "Invalid HTTP request")
    }

    pub fn request_timeout() -> Self {
        Self::plain(408, "Request Timeout", "Request was not received in time")
    }

    pub fn payload_too_large() -> Self {
        Self::plain(413, "Payload Too Large", "Request exceeds the size limit")
    }

    pub fn too_many_requests() -> Self {
        Self::plain(429, "Too Many Requests", "Rate limit exceeded. Please try again later.")
    }

    pub fn bad_gateway() -> Self {
        Self::plain(502, "Bad Gateway", "The content generator failed to respond")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub(crate) fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn clear_body(&mut self) {
        self.body.clear();
    }

    /// Encode the full response: status line, headers, blank line, body.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.encode_head();
        if !is_bodiless(self.status) {
            out.extend_from_slice(&self.body);
        }
        out
    }

    /// Encode only the status line and headers, as sent for `HEAD`.
    ///
    /// `Content-Length` still reports the length of the full body.
    pub fn encode_head(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        let reason = if is_valid_value(&self.reason) {
            self.reason.as_str()
        } else {
            ""
        };
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, reason).as_bytes());

        for (name, value) in self.headers.iter() {
            if !is_serializable(name, value) {
                tracing::debug!(header = %name, "Dropping header that is not wire-safe");
                continue;
            }
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        if !is_bodiless(self.status) {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        out
    }
}

/// Statuses that never carry a body and must not declare a length.
fn is_bodiless(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}

/// Standard reason phrase for a status code.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        413 => "Payload Too Large",
        418 => "I'm a teapot",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => match status / 100 {
            2 => "OK",
            3 => "Redirect",
            4 => "Client Error",
            _ => "Server Error",
        },
    }
}

fn is_serializable(name: &str, value: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(is_token_byte)
        && is_valid_value(value)
        && !FRAMING_HEADERS
            .iter()
            .any(|framing| name.eq_ignore_ascii_case(framing))
}
