//! Content generation subsystem.
//!
//! # Data Flow
//! ```text
//! Cache miss for a request
//!     → prompt.rs (system instruction + request rendered as HTTP text)
//!     → ContentGenerator (provider.rs in production, bounded by a timeout)
//!     → output.rs (untrusted text → normalized Response)
//!     → back to the cache
//! ```
//!
//! # Design Decisions
//! - The provider is asked for a full HTTP response; bare text is wrapped
//! - Every failure becomes a `GenerationError`, which callers turn into 502

pub mod output;
pub mod prompt;
pub mod provider;

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{GeneratorConfig, TimeoutConfig};
use crate::http::{Request, Response};
use crate::observability::metrics;
use crate::resilience::bounded;

pub use output::interpret_output;
pub use prompt::{Prompt, DEFAULT_SYSTEM_PROMPT};
pub use provider::ChatCompletionsClient;

/// Why a response could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The provider could not be reached or the exchange broke off.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// The provider answered with a non-success status.
    #[error("provider returned status {0}")]
    Status(u16),

    /// No answer within the configured time.
    #[error("provider timed out after {0} seconds")]
    Timeout(u64),

    /// The provider's answer cannot be turned into a response.
    #[error("invalid provider output: {0}")]
    InvalidOutput(String),
}

/// External text generator: prompt in, text out.
pub trait ContentGenerator: Send + Sync + 'static {
    fn generate(
        &self,
        prompt: &Prompt,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// Wraps a [`ContentGenerator`] with prompt building, a deadline and output
/// normalization.
#[derive(Debug)]
pub struct GeneratorAdapter<G> {
    generator: G,
    system_prompt: String,
    timeout: Duration,
}

impl<G: ContentGenerator> GeneratorAdapter<G> {
    pub fn new(generator: G, system_prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            generator,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    pub fn from_config(generator: G, config: &GeneratorConfig, timeouts: &TimeoutConfig) -> Self {
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Self::new(
            generator,
            system_prompt,
            Duration::from_secs(timeouts.generator_secs),
        )
    }

    /// Produce a response for `request` by asking the generator.
    pub async fn respond(&self, request: &Request) -> Result<Response, GenerationError> {
        let prompt = Prompt::for_request(request, &self.system_prompt);
        let started = Instant::now();

        let result = match bounded(self.timeout, self.generator.generate(&prompt)).await {
            Ok(result) => result.and_then(|text| interpret_output(&text, request)),
            Err(_) => Err(GenerationError::Timeout(self.timeout.as_secs())),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(GenerationError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        metrics::record_generation(outcome, started);
        tracing::debug!(
            method = %request.method(),
            target = %request.target(),
            outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation finished"
        );
        result
    }
}
