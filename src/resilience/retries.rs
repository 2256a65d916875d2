//! Retry policy for provider calls.
//!
//! # Design Decisions
//! - Transport failures, 429 and 5xx are retryable; other statuses are final
//! - Exponential backoff capped at `max_delay`, plus up to 10% jitter

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// How many times, and how far apart, a provider call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before attempt number `attempt + 1`, where `attempt` counts
    /// the attempts already made (starting at 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);

        let jitter_range = capped.as_millis() as u64 / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }
}

/// Whether a provider HTTP status is worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
