//! Turn orchestrator - the bounded model/tool loop
//!
//! One `orchestrate` call is one turn: persist the user message, load the
//! history window, then iterate model calls up to a fixed cap, routing tool
//! requests through the gateway and feeding results back into the transcript.
//! The loop always terminates within the cap, exactly one user and one
//! assistant message are persisted, and tool-result ordering always matches
//! tool-call-request ordering.

mod context;
mod side_channel;

pub use context::{ExerciseContext, ProgressSummary, TestResults, TurnContext};
pub use side_channel::SideChannel;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::gateway::{ToolGateway, ToolInvocationRecord};
use crate::provider::{
    ModelProvider, ModelRequest, StopReason, ToolResultBlock, TranscriptMessage,
};
use crate::session::HistoryAccessor;
use crate::store::{Message, MessageRole, MessageStore, SessionId, SessionStore};
use crate::tools::ToolDefinition;

/// Marker appended when the model hits its token limit mid-response
const TRUNCATION_MARKER: &str = "\n\n[Response truncated due to length]";

/// Input for one orchestration call
#[derive(Clone)]
pub struct TurnRequest {
    pub owner: String,
    pub session_id: SessionId,
    pub user_text: String,
    pub system_instructions: String,
    /// Rendered after the base instructions when present
    pub context: Option<TurnContext>,
    /// Tool definitions offered to the model; empty means no tools
    pub tool_defs: Vec<ToolDefinition>,
    /// Gateway for executing tool requests. Without one, tool requests
    /// degrade gracefully to end-of-turn.
    pub gateway: Option<Arc<ToolGateway>>,
}

impl TurnRequest {
    pub fn new(
        owner: impl Into<String>,
        session_id: impl Into<SessionId>,
        user_text: impl Into<String>,
        system_instructions: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            session_id: session_id.into(),
            user_text: user_text.into(),
            system_instructions: system_instructions.into(),
            context: None,
            tool_defs: Vec::new(),
            gateway: None,
        }
    }

    pub fn with_context(mut self, context: TurnContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_tools(mut self, tool_defs: Vec<ToolDefinition>, gateway: Arc<ToolGateway>) -> Self {
        self.tool_defs = tool_defs;
        self.gateway = Some(gateway);
        self
    }
}

/// Result of one orchestration call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub text: String,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    pub side_channel: SideChannel,
}

/// The turn orchestrator
///
/// Callers must guarantee at most one in-flight orchestration per session;
/// the orchestrator does not serialize concurrent calls against the same
/// session. Distinct sessions may run concurrently.
pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    provider: Arc<dyn ModelProvider>,
    sessions: Arc<dyn SessionStore>,
    history: HistoryAccessor,
    messages: Arc<dyn MessageStore>,
}

impl TurnOrchestrator {
    pub fn new<S>(config: OrchestratorConfig, provider: Arc<dyn ModelProvider>, store: Arc<S>) -> Self
    where
        S: SessionStore + MessageStore + 'static,
    {
        let sessions: Arc<dyn SessionStore> = store.clone();
        let messages: Arc<dyn MessageStore> = store;
        Self {
            config,
            provider,
            history: HistoryAccessor::new(messages.clone()),
            sessions,
            messages,
        }
    }

    /// Construct from separate session and message stores
    pub fn with_stores(
        config: OrchestratorConfig,
        provider: Arc<dyn ModelProvider>,
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            config,
            provider,
            history: HistoryAccessor::new(messages.clone()),
            sessions,
            messages,
        }
    }

    /// Run one turn. See the module docs for the protocol.
    pub async fn orchestrate(&self, request: TurnRequest) -> Result<OrchestrationResult> {
        let session_id = request.session_id.clone();
        info!(%session_id, owner = %request.owner, "Starting turn");
        if self.sessions.get(&session_id).await?.is_none() {
            return Err(Error::SessionNotFound(session_id));
        }

        // The user-message write precedes the history read, so the window
        // below includes this turn's user text.
        self.messages
            .append(Message::new(
                session_id.clone(),
                MessageRole::User,
                request.user_text.clone(),
            ))
            .await?;

        let window = self
            .history
            .recent(&session_id, self.config.history_limit)
            .await?;
        let mut transcript = HistoryAccessor::to_transcript(&window);

        // Base instructions first, context block second. Never the reverse.
        let system = match &request.context {
            Some(context) => format!(
                "{}\n\n{}",
                request.system_instructions,
                context.render()
            ),
            None => request.system_instructions.clone(),
        };

        let mut turn_records: Vec<ToolInvocationRecord> = Vec::new();
        let mut final_text = String::new();
        let mut iteration = 0;

        while iteration < self.config.max_iterations {
            iteration += 1;
            debug!(%session_id, iteration, "Model call");

            let response = self
                .provider
                .complete(ModelRequest {
                    system: system.clone(),
                    tools: request.tool_defs.clone(),
                    transcript: transcript.clone(),
                })
                .await?;

            match response.stop_reason {
                StopReason::EndOfTurn => {
                    final_text = response.text();
                    break;
                }
                StopReason::ToolRequest => {
                    let Some(gateway) = &request.gateway else {
                        // No gateway configured: degrade to end-of-turn with
                        // whatever text is present.
                        warn!(%session_id, "Tool request without a gateway; ending turn");
                        final_text = response.text();
                        break;
                    };

                    // Sequential execution in request order; result blocks
                    // are emitted in the same order, tagged by call id.
                    let mut results = Vec::new();
                    for (id, name, input) in response.tool_calls() {
                        info!(%session_id, tool = name, "Model requested tool");
                        let record = gateway.invoke(name, input.clone()).await;
                        results.push(ToolResultBlock {
                            tool_call_id: id.to_string(),
                            content: record.content.clone(),
                            is_error: record.is_error,
                        });
                        turn_records.push(record);
                    }

                    transcript.push(TranscriptMessage::AssistantBlocks {
                        content: response.content.clone(),
                    });
                    transcript.push(TranscriptMessage::ToolResults { results });
                }
                StopReason::LengthLimit => {
                    final_text = response.text();
                    final_text.push_str(TRUNCATION_MARKER);
                    break;
                }
                StopReason::Other => {
                    final_text = response.text();
                    break;
                }
            }
        }

        // The loop may have spent every iteration on tool calls. An empty
        // assistant message must never be persisted or returned.
        if final_text.is_empty() {
            info!(%session_id, iterations = iteration, "No text produced; using fallback completion");
            final_text = self.config.fallback_completion.clone();
        }

        self.messages
            .append(Message::new(
                session_id.clone(),
                MessageRole::Assistant,
                final_text.clone(),
            ))
            .await?;
        self.sessions.touch(&session_id).await?;

        Ok(OrchestrationResult {
            text: final_text,
            session_id,
            timestamp: Utc::now(),
            side_channel: SideChannel::collect(&turn_records),
        })
    }
}
