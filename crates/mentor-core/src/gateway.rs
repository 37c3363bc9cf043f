//! Tool invocation gateway
//!
//! Executes a single tool call with retry, exponential backoff, and a
//! per-attempt timeout. Failures never escape as errors: after attempts are
//! exhausted the gateway returns a structured error document marked as an
//! error result, so the model sees the failure and may adapt.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{OrchestratorConfig, RetryConfig};
use crate::error::ToolError;
use crate::tools::ToolRegistry;

/// Outcome of one gateway invocation. Transient: exists only within one
/// orchestration call.
#[derive(Debug, Clone)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    pub input: Value,
    /// Transcript-embeddable result, or the serialized error document
    pub content: String,
    pub is_error: bool,
    /// Attempts actually made, including the successful one
    pub attempts: u32,
}

/// Gateway that routes tool calls through the registry with retry/backoff
pub struct ToolGateway {
    registry: Arc<ToolRegistry>,
    retry: RetryConfig,
    attempt_timeout: Duration,
}

impl ToolGateway {
    pub fn new(registry: Arc<ToolRegistry>, config: &OrchestratorConfig) -> Self {
        Self {
            registry,
            retry: config.retry.clone(),
            attempt_timeout: Duration::from_secs(config.tool_timeout_secs),
        }
    }

    /// Tool definitions for every registered tool
    pub fn definitions(&self) -> Vec<crate::tools::ToolDefinition> {
        self.registry.definitions()
    }

    /// Invoke one tool call, retrying handler failures up to the configured
    /// attempt budget. Unknown tools and invalid parameters are reported
    /// immediately without retry; any other failure is treated as transient.
    pub async fn invoke(&self, tool_name: &str, input: Value) -> ToolInvocationRecord {
        let mut attempts = 0;
        let mut last_error;

        loop {
            attempts += 1;
            debug!(tool = tool_name, attempt = attempts, "Invoking tool");

            let attempt = timeout(
                self.attempt_timeout,
                self.registry.dispatch(tool_name, input.clone()),
            );
            match attempt.await {
                Ok(Ok(content)) => {
                    return ToolInvocationRecord {
                        tool_name: tool_name.to_string(),
                        input,
                        content,
                        is_error: false,
                        attempts,
                    };
                }
                Ok(Err(e @ ToolError::NotFound(_))) | Ok(Err(e @ ToolError::InvalidParams(_))) => {
                    // Retrying cannot fix these; report straight away
                    warn!(tool = tool_name, error = %e, "Tool call rejected");
                    return self.error_record(tool_name, input, attempts, &e.to_string());
                }
                Ok(Err(e)) => {
                    warn!(tool = tool_name, attempt = attempts, error = %e, "Tool attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        tool = tool_name,
                        attempt = attempts,
                        timeout_secs = self.attempt_timeout.as_secs(),
                        "Tool attempt timed out"
                    );
                    last_error =
                        ToolError::Timeout(self.attempt_timeout.as_secs()).to_string();
                }
            }

            if attempts >= self.retry.max_attempts {
                return self.error_record(tool_name, input, attempts, &last_error);
            }
            tokio::time::sleep(self.retry.delay_after(attempts)).await;
        }
    }

    fn error_record(
        &self,
        tool_name: &str,
        input: Value,
        attempts: u32,
        message: &str,
    ) -> ToolInvocationRecord {
        let doc = json!({
            "error": message,
            "tool_name": tool_name,
            "suggestion": format!(
                "Tool failed after {attempts} attempt(s). Please try an alternative approach or inform the user."
            ),
            "timestamp": Utc::now().to_rfc3339(),
        });
        ToolInvocationRecord {
            tool_name: tool_name.to_string(),
            input,
            content: doc.to_string(),
            is_error: true,
            attempts,
        }
    }
}
