//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the provider URL.
pub const ENV_SERVER_URL: &str = "AI_SERVER_URL";
/// Environment variable holding the provider API key.
pub const ENV_SERVER_KEY: &str = "AI_SERVER_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from a TOML file without validating it.
fn read_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Command-line settings that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Load configuration: optional TOML file, then `.env` and process
/// environment overrides for provider credentials, then command-line
/// overrides, then validation.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<ServerConfig, ConfigError> {
    let config = match path {
        Some(path) => read_config(path)?,
        None => ServerConfig::default(),
    };

    // Load .env file if present (ignore errors if missing)
    let _ = dotenvy::dotenv();
    assemble(config, |name| std::env::var(name).ok(), overrides)
}

/// Apply environment and command-line overrides to `config` and validate.
pub fn assemble<F>(
    mut config: ServerConfig,
    lookup: F,
    overrides: &Overrides,
) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup);
    override_bind_address(&mut config, overrides.host.as_deref(), overrides.port);
    if let Some(level) = &overrides.log_level {
        config.observability.log_level = level.clone();
    }
    finalize(config)
}

/// Validate a fully assembled configuration.
fn finalize(config: ServerConfig) -> Result<ServerConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay provider credentials from the environment onto `config`.
fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.is_empty()) {
        config.generator.endpoint = url;
    }
    if let Some(key) = lookup(ENV_SERVER_KEY).filter(|v| !v.is_empty()) {
        config.generator.api_key = key;
    }
}

/// Replace the host and/or port of `listener.bind_address`.
fn override_bind_address(config: &mut ServerConfig, host: Option<&str>, port: Option<u16>) {
    if host.is_none() && port.is_none() {
        return;
    }
    let current = config.listener.bind_address.as_str();
    let (current_host, current_port) = match current.rsplit_once(':') {
        Some((h, p)) => (h, p),
        None => (current, "8000"),
    };

    let host = match host {
        Some(h) if h.contains(':') && !h.starts_with('[') => format!("[{h}]"),
        Some(h) => h.to_string(),
        None => current_host.to_string(),
    };
    let port = port.map_or_else(|| current_port.to_string(), |p| p.to_string());
    config.listener.bind_address = format!("{host}:{port}");
}
