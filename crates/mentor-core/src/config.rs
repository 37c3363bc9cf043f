//! Configuration for the orchestration engine
//!
//! All limits and retry parameters live in one immutable config object that
//! is injected at construction. Nothing in the crate reads ambient global
//! state; API keys are passed explicitly to the provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a turn orchestrator and its collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Model identifier passed to the provider
    pub model: String,
    /// Maximum tokens per model response
    pub max_tokens: u32,
    /// How many prior messages are loaded into the transcript
    pub history_limit: usize,
    /// Maximum model round-trips per turn
    pub max_iterations: usize,
    /// Retry/backoff parameters for tool invocations
    pub retry: RetryConfig,
    /// Timeout for a single model call, in seconds
    pub model_timeout_secs: u64,
    /// Timeout for a single tool invocation attempt, in seconds
    pub tool_timeout_secs: u64,
    /// Assistant text synthesized when the iteration cap is exhausted
    /// without the model ever producing text
    pub fallback_completion: String,
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_fallback_completion() -> String {
    "I've completed the setup for your learning session. Let's begin!".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: 4096,
            history_limit: 20,
            max_iterations: 5,
            retry: RetryConfig::default(),
            model_timeout_secs: 120,
            tool_timeout_secs: 60,
            fallback_completion: default_fallback_completion(),
        }
    }
}

/// Exponential backoff parameters for the tool invocation gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after a failed attempt (1-based), doubling per attempt
    /// and capped at `max_delay_ms`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}
