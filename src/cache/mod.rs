//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request
//!     → key.rs (method + normalized path [+ query] [+ vary headers])
//!     → store.rs lookup
//!         hit    → shared Arc<Response>
//!         miss   → single generator call per key, result stored on success
//!     → entry.rs (creation time, LRU stamp)
//! ```
//!
//! # Design Decisions
//! - Bounded by entry count with LRU eviction, plus optional TTL
//! - Failed generations are never stored
//! - Stored responses are immutable and shared by reference

pub mod entry;
pub mod key;
pub mod store;

pub use key::{CacheKey, KeyPolicy};
pub use store::{CacheStatsSnapshot, Lookup, ResponseCache};
