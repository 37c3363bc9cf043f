//! Model provider abstraction
//!
//! The orchestrator talks to the model through a narrow contract: a system
//! string, optional tool definitions, and a transcript go in; a stop reason
//! and an ordered list of content blocks come out. The concrete wire client
//! lives in [`anthropic`]; tests swap in scripted providers.

mod anthropic;

pub use anthropic::AnthropicProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::tools::ToolDefinition;

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural completion
    EndOfTurn,
    /// The model is requesting one or more tool invocations
    ToolRequest,
    /// Output was cut off by the token limit
    LengthLimit,
    /// Anything else the provider reports
    Other,
}

/// One block of model output, in response order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
}

/// A complete (non-streaming) model response
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
}

impl ModelResponse {
    /// Join all text blocks in response order, dropping non-text blocks.
    ///
    /// This projection is intentional: tool-call blocks are consumed by the
    /// orchestrator and never surface in the assistant text.
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        parts.join("\n")
    }

    /// Tool-call blocks in the order the model emitted them
    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolCall { id, name, input } => {
                Some((id.as_str(), name.as_str(), input))
            }
            _ => None,
        })
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}

/// One tool result block, tagged with the originating call id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// One turn of the model-facing transcript
///
/// Plain user/assistant turns come from persisted history; the block-level
/// variants exist only within a single orchestration call and are never
/// persisted as messages.
#[derive(Debug, Clone)]
pub enum TranscriptMessage {
    User { content: String },
    Assistant { content: String },
    /// The model's own tool-request content, echoed back verbatim
    AssistantBlocks { content: Vec<ContentBlock> },
    /// Results for every call of the preceding tool request, in request order
    ToolResults { results: Vec<ToolResultBlock> },
}

/// A single model invocation
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// System instructions (base instructions plus any rendered context)
    pub system: String,
    /// Tool definitions offered to the model; empty means no tools
    pub tools: Vec<ToolDefinition>,
    pub transcript: Vec<TranscriptMessage>,
}

/// Trait for model providers
///
/// A provider failure is fatal to the current turn: the orchestrator does not
/// retry model calls, it propagates the error to the caller.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse>;
}
