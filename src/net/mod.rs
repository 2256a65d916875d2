//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (connection ID, active count)
//!     → reader.rs (buffer bytes until one request frame is complete)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection owns its read buffer; nothing here is shared

pub mod connection;
pub mod listener;
pub mod reader;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Accepted, Listener, ListenerError};
pub use reader::{ConnectionReader, Frame, FrameError, FrameLimits};
