//! OpenAI-compatible chat completions client.
//!
//! # Responsibilities
//! - POST `{model, messages: [system, user], stream: false}` with bearer auth
//! - Extract `choices[0].message.content`
//! - Retry transport failures, 429 and 5xx with jittered backoff

use serde::{Deserialize, Serialize};

use crate::config::{GeneratorConfig, RetryConfig};
use crate::generator::prompt::Prompt;
use crate::generator::{ContentGenerator, GenerationError};
use crate::resilience::{is_retryable_status, RetryPolicy};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by a chat completions HTTP API.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn new(config: &GeneratorConfig, retries: &RetryConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ai-http-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retry: RetryPolicy::from_config(retries),
        })
    }

    async fn call(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidOutput(format!("undecodable body: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GenerationError::InvalidOutput("no message content".into()))
    }
}

impl ContentGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.call(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };

            let retryable = match &err {
                GenerationError::Provider(_) => true,
                GenerationError::Status(status) => is_retryable_status(*status),
                _ => false,
            };
            if !retryable || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            let delay = self.retry.backoff(attempt);
            tracing::warn!(attempt, delay = ?delay, error = %err, "Retrying provider call");
            tokio::time::sleep(delay).await;
        }
    }
}
