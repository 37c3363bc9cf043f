//! Side-channel extraction from tool results
//!
//! Tool result documents can declare out-of-band data for the caller:
//! identifiers of created artifacts and navigation/action payloads. The
//! orchestrator scans every successful result produced during a turn and
//! returns the findings alongside the assistant text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::ToolInvocationRecord;

/// Out-of-band structured data returned with the assistant text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideChannel {
    /// Id of content created during the turn, if any
    pub content_id: Option<String>,
    /// Id of an exercise created during the turn, if any
    pub exercise_id: Option<String>,
    /// Navigation/action payloads, in the order they were produced
    pub actions: Vec<Value>,
}

impl SideChannel {
    pub fn is_empty(&self) -> bool {
        self.content_id.is_none() && self.exercise_id.is_none() && self.actions.is_empty()
    }

    /// Scan the turn's tool invocation records for declared side-channel
    /// fields. Error results and non-JSON results are skipped.
    pub fn collect(records: &[ToolInvocationRecord]) -> Self {
        let mut channel = Self::default();

        for record in records {
            if record.is_error {
                continue;
            }
            let doc: Value = match serde_json::from_str(&record.content) {
                Ok(doc) => doc,
                Err(_) => continue,
            };

            if let Some(id) = doc["content_id"].as_str() {
                channel.content_id = Some(id.to_string());
            }
            if let Some(id) = doc["exercise_id"].as_str() {
                channel.exercise_id = Some(id.to_string());
            }
            // Handlers declare either a ready-made action or a bare
            // navigation payload; both surface as actions.
            if !doc["action"].is_null() {
                channel.actions.push(doc["action"].clone());
            }
            if !doc["navigation"].is_null() {
                channel.actions.push(serde_json::json!({
                    "type": "navigate",
                    "data": doc["navigation"],
                }));
            }
        }

        channel
    }
}
