//! Security subsystem.
//!
//! # Responsibilities
//! - Per-client rate limiting (rate_limit.rs)
//!
//! Request size limits are enforced while framing, in `net::reader`.

pub mod rate_limit;

pub use rate_limit::RateLimiter;
