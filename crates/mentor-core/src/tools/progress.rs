//! Progress and navigation tools

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ToolError;
use crate::store::DocumentStore;

use super::{BoxFuture, Tool};

const STATUSES: &[&str] = &["not_started", "in_progress", "completed"];

/// Upsert the user's progress on a learning node
pub struct UpdateProgress {
    store: Arc<dyn DocumentStore>,
    owner: String,
}

impl UpdateProgress {
    pub fn new(store: Arc<dyn DocumentStore>, owner: String) -> Self {
        Self { store, owner }
    }
}

impl Tool for UpdateProgress {
    fn name(&self) -> &str {
        "update_progress"
    }

    fn description(&self) -> &str {
        "Update the user's learning progress. Use when the user completes exercises or milestones."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "node_id": {"type": "string", "description": "Learning node ID"},
                "status": {
                    "type": "string",
                    "enum": STATUSES,
                    "description": "Current status"
                },
                "completion_percentage": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 100
                }
            },
            "required": ["node_id", "status"]
        })
    }

    fn handle(&self, input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async move {
            let node_id = input["node_id"]
                .as_str()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ToolError::InvalidParams("missing required field: node_id".to_string())
                })?
                .to_string();
            let status = input["status"].as_str().unwrap_or_default();
            if !STATUSES.contains(&status) {
                return Err(ToolError::InvalidParams(format!(
                    "invalid status: {status}"
                )));
            }
            let percentage = input["completion_percentage"].as_u64().unwrap_or(0).min(100);

            // Keyed upsert makes this handler safely re-runnable under retry
            let key = format!("{}:{}", self.owner, node_id);
            let doc = json!({
                "user_id": self.owner,
                "node_id": node_id,
                "status": status,
                "completion_percentage": percentage,
                "updated_at": Utc::now().to_rfc3339(),
            });
            self.store
                .upsert("user_progress", &key, doc)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            info!(%node_id, status, "Updated progress");

            Ok(json!({
                "success": true,
                "node_id": node_id,
                "status": status,
                "message": "Progress updated",
            }))
        })
    }
}

/// Emit a navigation action for the frontend (no persistence)
pub struct NavigateToStep;

impl NavigateToStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NavigateToStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for NavigateToStep {
    fn name(&self) -> &str {
        "navigate_to_step"
    }

    fn description(&self) -> &str {
        "Navigate the user to the next learning step (exercise or content node). \
         Use this to move them forward after completing the current activity."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_type": {
                    "type": "string",
                    "enum": ["exercise", "node"],
                    "description": "'exercise' for practice exercises, 'node' for learning content"
                },
                "target_id": {"type": "string"},
                "reason": {
                    "type": "string",
                    "description": "Why the user is being moved to this step"
                }
            },
            "required": ["target_type", "target_id"]
        })
    }

    fn handle(&self, input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async move {
            let target_type = input["target_type"].as_str().unwrap_or("exercise");
            let target_id = input["target_id"]
                .as_str()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ToolError::InvalidParams("missing required field: target_id".to_string())
                })?;
            let reason = input["reason"].as_str().unwrap_or("");
            info!(target_type, target_id, "Navigation requested");

            let mut action = serde_json::Map::new();
            action.insert("type".to_string(), json!(format!("navigate_to_{target_type}")));
            action.insert(format!("{target_type}_id"), json!(target_id));
            action.insert("reason".to_string(), json!(reason));

            Ok(json!({
                "success": true,
                "action": action,
                "message": format!("Navigating to {target_type}..."),
            }))
        })
    }
}
