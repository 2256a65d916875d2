//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept, one task per connection)
//!     → net::reader (frame one request)
//!     → request.rs (parse request line, headers, body)
//!     → cache / generator
//!     → response.rs (serialize with Content-Length, Connection: close)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Framing, parsing and serialization are hand-written over raw bytes
//! - One request per connection; every response closes the connection

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use headers::Headers;
pub use request::{ParseError, Request};
pub use response::Response;
pub use server::HttpServer;
