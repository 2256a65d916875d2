//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Generator provider settings.
    pub generator: GeneratorConfig,

    /// Provider retry configuration.
    pub retries: RetryConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "localhost:8000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "localhost:8000".to_string(),
            max_connections: 1024,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of the request line plus headers, terminator included.
    pub max_header_bytes: usize,

    /// Maximum declared body size.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Timeout configuration for the three suspension points of a connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to receive a complete request, in seconds.
    pub read_secs: u64,

    /// Time allowed to write the response, in seconds.
    pub write_secs: u64,

    /// Time allowed for one generator call (all retries included), in seconds.
    pub generator_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 30,
            write_secs: 30,
            generator_secs: 120,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses. 0 disables the bound.
    pub max_entries: usize,

    /// Entry lifetime in seconds. 0 keeps entries for the process lifetime.
    pub ttl_secs: u64,

    /// How often expired entries are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Include the query string in the cache key.
    pub include_query: bool,

    /// Request headers whose values become part of the cache key.
    pub vary_headers: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 300,
            sweep_interval_secs: 60,
            include_query: false,
            vary_headers: Vec::new(),
        }
    }
}

/// Generator provider configuration.
///
/// `endpoint` and `api_key` are normally supplied through the
/// `AI_SERVER_URL` and `AI_SERVER_KEY` environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// OpenAI-compatible chat completions URL.
    pub endpoint: String,

    /// Bearer token for the provider.
    pub api_key: String,

    /// Model name sent with every call.
    pub model: String,

    /// Replaces the built-in system instruction when set.
    pub system_prompt: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            system_prompt: None,
        }
    }
}

/// Retry configuration for provider calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per generation (1 disables retries).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 250,
            max_delay_ms: 2000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client IP.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 1.0,
            burst_size: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "localhost:8000");
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.generator.model, "deepseek-chat");
        assert!(!config.rate_limit.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [cache]
            include_query = true
            vary_headers = ["Accept-Language"]

            [listener]
            bind_address = "0.0.0.0:9000"
            "#,
        )
        .unwrap();

        assert!(config.cache.include_query);
        assert_eq!(config.cache.vary_headers, vec!["Accept-Language".to_string()]);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.listener.max_connections, 1024);
    }
}
