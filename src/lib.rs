//! HTTP/1.1 server whose every response is written by a generative model.
//!
//! Requests are framed and parsed straight off the socket, answered from a
//! shared response cache, and on a miss rendered into a prompt for an
//! OpenAI-compatible chat completions provider.

// Core subsystems
pub mod cache;
pub mod config;
pub mod generator;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::ServerConfig;
pub use generator::{ChatCompletionsClient, ContentGenerator, GenerationError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
