//! Behavioral telemetry tools
//!
//! Observational tools the model uses to record engagement and struggle
//! signals for later personalization. They append event documents and never
//! mutate learning state, so retrying them is always safe.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ToolError;
use crate::store::DocumentStore;

use super::{BoxFuture, Tool, ToolKind};

const SEVERITIES: &[&str] = &["low", "medium", "high"];

/// Record an engagement metric observed during the conversation
pub struct RecordEngagementMetric {
    store: Arc<dyn DocumentStore>,
    owner: String,
}

impl RecordEngagementMetric {
    pub fn new(store: Arc<dyn DocumentStore>, owner: String) -> Self {
        Self { store, owner }
    }
}

impl Tool for RecordEngagementMetric {
    fn name(&self) -> &str {
        "record_engagement_metric"
    }

    fn description(&self) -> &str {
        "Record an engagement signal (session length, response quality, question depth) \
         observed while tutoring. Used for adaptive personalization."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "metric_type": {
                    "type": "string",
                    "description": "Kind of engagement signal, e.g. 'response_quality'"
                },
                "value": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 1,
                    "description": "Normalized metric value"
                },
                "context": {"type": "string"}
            },
            "required": ["value"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Observational
    }

    fn handle(&self, input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async move {
            let value = input["value"].as_f64().ok_or_else(|| {
                ToolError::InvalidParams("missing required field: value".to_string())
            })?;

            let doc = json!({
                "user_id": self.owner,
                "event_type": "engagement_metric",
                "metric_type": input["metric_type"].as_str().unwrap_or("general"),
                "value": value.clamp(0.0, 1.0),
                "context": input["context"].as_str().unwrap_or(""),
                "timestamp": Utc::now().to_rfc3339(),
            });
            self.store
                .insert("behavioral_events", doc)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            debug!(value, "Recorded engagement metric");

            Ok(json!({"success": true, "message": "Engagement metric recorded"}))
        })
    }
}

/// Record that the user appears to be struggling
pub struct RecordStruggleIndicator {
    store: Arc<dyn DocumentStore>,
    owner: String,
}

impl RecordStruggleIndicator {
    pub fn new(store: Arc<dyn DocumentStore>, owner: String) -> Self {
        Self { store, owner }
    }
}

impl Tool for RecordStruggleIndicator {
    fn name(&self) -> &str {
        "record_struggle_indicator"
    }

    fn description(&self) -> &str {
        "Record when the user seems to be struggling (repeated errors, confusion signals, \
         stuck on a concept) so future sessions can adapt."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "indicator_type": {
                    "type": "string",
                    "description": "e.g. 'repeated_errors', 'long_pause', 'confusion_signal'"
                },
                "context": {
                    "type": "string",
                    "description": "What the user is struggling with"
                },
                "severity": {
                    "type": "string",
                    "enum": SEVERITIES
                }
            },
            "required": ["indicator_type", "context"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Observational
    }

    fn handle(&self, input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async move {
            let indicator_type = input["indicator_type"].as_str().ok_or_else(|| {
                ToolError::InvalidParams("missing required field: indicator_type".to_string())
            })?;
            let context = input["context"].as_str().unwrap_or("");
            // Out-of-range severities degrade to the default rather than failing
            let severity = match input["severity"].as_str() {
                Some(s) if SEVERITIES.contains(&s) => s,
                _ => "medium",
            };

            let doc = json!({
                "user_id": self.owner,
                "event_type": "struggle_indicator",
                "indicator_type": indicator_type,
                "context": context,
                "severity": severity,
                "timestamp": Utc::now().to_rfc3339(),
            });
            self.store
                .insert("behavioral_events", doc)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            debug!(indicator_type, severity, "Recorded struggle indicator");

            Ok(json!({"success": true, "message": "Struggle indicator recorded"}))
        })
    }
}
