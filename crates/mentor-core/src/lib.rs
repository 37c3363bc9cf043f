//! Mentor Core - conversation orchestration with AI tool calling
//!
//! This crate provides the core engine of the Mentor tutoring platform:
//! - Session registry and bounded history access over narrow store traits
//! - A turn orchestrator running the bounded model/tool loop
//! - A tool invocation gateway with retry, backoff, and error surfacing
//! - A tool registry with the built-in tutoring tools
//! - A model provider abstraction with an Anthropic wire client
//!
//! HTTP routing, authentication, prompt wording, and storage engine
//! internals are collaborators of this crate, not part of it.

pub mod config;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod store;
pub mod tools;

pub use config::{OrchestratorConfig, RetryConfig};
pub use error::{Error, Result, ToolError};
pub use gateway::{ToolGateway, ToolInvocationRecord};
pub use orchestrator::{
    OrchestrationResult, SideChannel, TurnContext, TurnOrchestrator, TurnRequest,
};
pub use provider::{
    AnthropicProvider, ContentBlock, ModelProvider, ModelRequest, ModelResponse, StopReason,
    ToolResultBlock, TranscriptMessage,
};
pub use session::{HistoryAccessor, SessionRegistry};
pub use store::{
    DocumentStore, MemoryStore, Message, MessageRole, MessageStore, Session, SessionId,
    SessionStore,
};
pub use tools::{Tool, ToolDefinition, ToolKind, ToolRegistry, ToolRegistryBuilder};
