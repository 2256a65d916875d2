//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Socket read / write, generator call:
//!     → timeouts.rs (deadline per suspension point)
//! Provider call failure:
//!     → retries.rs (retryable? back off and try again)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external wait has a deadline
//! - Jittered backoff prevents synchronized retries against the provider

pub mod retries;
pub mod timeouts;

pub use retries::{is_retryable_status, RetryPolicy};
pub use timeouts::{bounded, TimedOut};
