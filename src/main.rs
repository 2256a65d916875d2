//! ai-http-server
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────┐    ┌──────────┐    ┌──────────┐
//!     ───────────────────▶│   net    │───▶│   http   │───▶│  cache   │
//!                         │ listener │    │ dispatch │    │ (LRU/TTL)│
//!                         └──────────┘    └──────────┘    └────┬─────┘
//!                                                              │ miss
//!                                                              ▼
//!     Client Response     ┌──────────┐                   ┌──────────┐
//!     ◀───────────────────│ response │◀──────────────────│generator │◀──── Provider
//!                         │  encode  │                   │ (prompt) │
//!                         └──────────┘                   └──────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use ai_http_server::config::{load_config, ObservabilityConfig, Overrides};
use ai_http_server::net::Listener;
use ai_http_server::observability::{init_logging, metrics};
use ai_http_server::{ChatCompletionsClient, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "ai-http-server")]
#[command(about = "HTTP/1.1 server that answers every request with generated content", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (RUST_LOG still wins)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = Overrides {
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
    };
    let config = match load_config(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&ObservabilityConfig {
                log_level: overrides.log_level.unwrap_or_else(|| "info".into()),
                ..Default::default()
            });
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        model = %config.generator.model,
        cache_max_entries = config.cache.max_entries,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let generator = ChatCompletionsClient::new(&config.generator, &config.retries)?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, generator);
    let serving = server.run(listener, shutdown.subscribe());

    tokio::select! {
        result = serving => result?,
        _ = shutdown.trigger_on_ctrl_c() => {}
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
