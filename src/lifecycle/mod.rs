//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C (or test trigger) → Stop accepting → Background tasks exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Connections already accepted finish on their own

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
