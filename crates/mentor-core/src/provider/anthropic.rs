//! Anthropic Messages API provider
//!
//! Wire client for the non-streaming Messages endpoint. Request building and
//! response parsing are kept as plain functions so they can be tested without
//! a network.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};

use super::{
    ContentBlock, ModelProvider, ModelRequest, ModelResponse, StopReason, TranscriptMessage,
};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model provider backed by the Anthropic Messages API
pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, config: &OrchestratorConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::Config("Anthropic API key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.model_timeout_secs))
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse> {
        let body = build_request_body(&self.model, self.max_tokens, &request);
        debug!(model = %self.model, turns = request.transcript.len(), "Calling model");

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let detail = payload["error"]["message"].as_str().unwrap_or("unknown");
            return Err(Error::Provider(format!("API error {status}: {detail}")));
        }

        parse_response(&payload)
    }
}

/// Build the JSON body for the Messages API
fn build_request_body(model: &str, max_tokens: u32, request: &ModelRequest) -> Value {
    let mut messages = Vec::new();
    for turn in &request.transcript {
        match turn {
            TranscriptMessage::User { content } => {
                messages.push(json!({"role": "user", "content": content}));
            }
            TranscriptMessage::Assistant { content } => {
                messages.push(json!({"role": "assistant", "content": content}));
            }
            TranscriptMessage::AssistantBlocks { content } => {
                let blocks: Vec<Value> = content.iter().map(wire_block).collect();
                messages.push(json!({"role": "assistant", "content": blocks}));
            }
            TranscriptMessage::ToolResults { results } => {
                // Tool results ride in a user turn on this API
                let blocks: Vec<Value> = results
                    .iter()
                    .map(|r| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": r.tool_call_id,
                            "content": r.content,
                            "is_error": r.is_error,
                        })
                    })
                    .collect();
                messages.push(json!({"role": "user", "content": blocks}));
            }
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "system": request.system,
        "messages": messages,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }

    body
}

fn wire_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::ToolCall { id, name, input } => {
            json!({"type": "tool_use", "id": id, "name": name, "input": input})
        }
    }
}

/// Parse a Messages API response into the provider-neutral shape
fn parse_response(payload: &Value) -> Result<ModelResponse> {
    let stop_reason = match payload["stop_reason"].as_str() {
        Some("end_turn") => StopReason::EndOfTurn,
        Some("tool_use") => StopReason::ToolRequest,
        Some("max_tokens") => StopReason::LengthLimit,
        _ => StopReason::Other,
    };

    let blocks = payload["content"]
        .as_array()
        .ok_or_else(|| Error::Provider("response has no content array".to_string()))?;

    let mut content = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => content.push(ContentBlock::Text {
                text: block["text"].as_str().unwrap_or("").to_string(),
            }),
            Some("tool_use") => content.push(ContentBlock::ToolCall {
                id: block["id"].as_str().unwrap_or("").to_string(),
                name: block["name"].as_str().unwrap_or("").to_string(),
                input: block["input"].clone(),
            }),
            // Unknown block types (thinking, citations, ...) are dropped
            _ => {}
        }
    }

    Ok(ModelResponse {
        stop_reason,
        content,
    })
}
