//! Tool system
//!
//! Tools are the operations the model may request during a turn. Each tool
//! has:
//! - A name and description for the model
//! - A JSON schema for its input
//! - A handle method producing a document
//! - A kind: action (side-effecting) or observational
//!
//! Dispatch resolves tools by name and owns serialization of handler output
//! into a transcript-embeddable string.

pub mod content;
pub mod progress;
pub mod telemetry;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ToolError;
use crate::store::DocumentStore;

/// Boxed future type for object-safe async trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which handler family a tool belongs to
///
/// Both families share one dispatch surface; the kind exists so callers can
/// reason about side effects (action handlers must be safely re-runnable,
/// since the gateway retries failed invocations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Side-effecting: creates content, updates progress, navigates
    Action,
    /// Records observations without changing learning state
    Observational,
}

/// Tool definition in the shape the model provider consumes.
/// Immutable once registered for a given run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Core trait for all tools
pub trait Tool: Send + Sync {
    /// Tool name (used by the model to invoke)
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON schema for the input
    fn input_schema(&self) -> Value;

    fn kind(&self) -> ToolKind {
        ToolKind::Action
    }

    /// Execute the tool, producing a result document
    fn handle(&self, input: Value) -> BoxFuture<'_, Result<Value, ToolError>>;

    /// Convert to a definition for the model
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Registry of available tools, populated at startup
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(tool = tool.name(), kind = ?tool.kind(), "Registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for all registered tools
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve a tool by name and run it, serializing the output document
    /// into a transcript-embeddable string.
    ///
    /// String outputs pass through as-is; any other document is JSON-encoded.
    pub async fn dispatch(&self, name: &str, input: Value) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let output = tool.handle(input).await?;
        match output {
            Value::String(s) => Ok(s),
            doc => serde_json::to_string(&doc)
                .map_err(|e| ToolError::MalformedResult(e.to_string())),
        }
    }
}

/// Builder for the standard tutoring tool registry
///
/// Registers the built-in action and observational tools against a document
/// store, scoped to one owner. Custom tools can be added afterwards via
/// [`ToolRegistry::register`].
pub struct ToolRegistryBuilder {
    store: Arc<dyn DocumentStore>,
    owner: String,
    include_content: bool,
    include_progress: bool,
    include_telemetry: bool,
}

impl ToolRegistryBuilder {
    pub fn new(store: Arc<dyn DocumentStore>, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into(),
            include_content: true,
            include_progress: true,
            include_telemetry: true,
        }
    }

    /// Enable/disable content creation tools
    pub fn with_content(mut self, enabled: bool) -> Self {
        self.include_content = enabled;
        self
    }

    /// Enable/disable progress and navigation tools
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.include_progress = enabled;
        self
    }

    /// Enable/disable behavioral telemetry tools
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.include_telemetry = enabled;
        self
    }

    pub fn build(self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();

        if self.include_content {
            registry.register(Arc::new(content::CreateLearningContent::new(
                self.store.clone(),
                self.owner.clone(),
            )));
            registry.register(Arc::new(content::CreateExercise::new(
                self.store.clone(),
                self.owner.clone(),
            )));
        }

        if self.include_progress {
            registry.register(Arc::new(progress::UpdateProgress::new(
                self.store.clone(),
                self.owner.clone(),
            )));
            registry.register(Arc::new(progress::NavigateToStep::new()));
        }

        if self.include_telemetry {
            registry.register(Arc::new(telemetry::RecordEngagementMetric::new(
                self.store.clone(),
                self.owner.clone(),
            )));
            registry.register(Arc::new(telemetry::RecordStruggleIndicator::new(
                self.store,
                self.owner,
            )));
        }

        registry
    }
}
