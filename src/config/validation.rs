//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check the provider endpoint is a usable URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was left empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A numeric field must be strictly positive.
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    /// The provider endpoint is not an http(s) URL.
    #[error("generator.endpoint '{0}' is not a valid http(s) URL")]
    InvalidEndpoint(String),

    /// A header name listed for cache variation is not a valid token.
    #[error("cache.vary_headers entry '{0}' is not a valid header name")]
    InvalidVaryHeader(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::Missing("listener.bind_address"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NotPositive("listener.max_connections"));
    }
    if config.limits.max_header_bytes == 0 {
        errors.push(ValidationError::NotPositive("limits.max_header_bytes"));
    }
    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::NotPositive("timeouts.read_secs"));
    }
    if config.timeouts.write_secs == 0 {
        errors.push(ValidationError::NotPositive("timeouts.write_secs"));
    }
    if config.timeouts.generator_secs == 0 {
        errors.push(ValidationError::NotPositive("timeouts.generator_secs"));
    }
    if config.cache.ttl_secs > 0 && config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::NotPositive("cache.sweep_interval_secs"));
    }
    for name in &config.cache.vary_headers {
        if name.is_empty() || !name.bytes().all(crate::http::headers::is_token_byte) {
            errors.push(ValidationError::InvalidVaryHeader(name.clone()));
        }
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::NotPositive("retries.max_attempts"));
    }
    if config.rate_limit.enabled {
        let rps = config.rate_limit.requests_per_second;
        if rps.is_nan() || rps <= 0.0 {
            errors.push(ValidationError::NotPositive("rate_limit.requests_per_second"));
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::NotPositive("rate_limit.burst_size"));
        }
    }

    if config.generator.endpoint.is_empty() {
        errors.push(ValidationError::Missing("generator.endpoint (AI_SERVER_URL)"));
    } else {
        match url::Url::parse(&config.generator.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::InvalidEndpoint(
                config.generator.endpoint.clone(),
            )),
        }
    }
    if config.generator.api_key.is_empty() {
        errors.push(ValidationError::Missing("generator.api_key (AI_SERVER_KEY)"));
    }
    if config.generator.model.trim().is_empty() {
        errors.push(ValidationError::Missing("generator.model"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.generator.endpoint = "https://api.example.com/v1/chat/completions".into();
        config.generator.api_key = "secret".into();
        config
    }

    #[test]
    fn defaults_with_credentials_pass() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn missing_credentials_are_reported_together() {
        let errors = validate_config(&ServerConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("AI_SERVER_URL"));
        assert!(errors[1].to_string().contains("AI_SERVER_KEY"));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let mut config = valid();
        config.generator.endpoint = "ftp://example.com".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidEndpoint("ftp://example.com".into())]
        );
    }

    #[test]
    fn rejects_zero_limits_and_bad_vary_header() {
        let mut config = valid();
        config.timeouts.read_secs = 0;
        config.listener.max_connections = 0;
        config.cache.vary_headers = vec!["Accept Language".into()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::NotPositive("timeouts.read_secs")));
    }

    #[test]
    fn rate_limit_checked_only_when_enabled() {
        let mut config = valid();
        config.rate_limit.burst_size = 0;
        assert!(validate_config(&config).is_ok());

        config.rate_limit.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
