//! Content creation tools
//!
//! Action tools that persist model-generated learning material. The result
//! documents carry the ids the orchestrator later lifts into the side
//! channel (`content_id`, `exercise_id`).

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ToolError;
use crate::store::DocumentStore;

use super::{BoxFuture, Tool};

fn require_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    input[field]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidParams(format!("missing required field: {field}")))
}

/// Persist a block of educational content (notes, explanations, examples)
pub struct CreateLearningContent {
    store: Arc<dyn DocumentStore>,
    owner: String,
}

impl CreateLearningContent {
    pub fn new(store: Arc<dyn DocumentStore>, owner: String) -> Self {
        Self { store, owner }
    }
}

impl Tool for CreateLearningContent {
    fn name(&self) -> &str {
        "create_learning_content"
    }

    fn description(&self) -> &str {
        "Create educational content (notes, explanations, concept breakdowns) for the user. \
         Use this to teach concepts before exercises or provide custom notes."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Title of the content"},
                "content_type": {
                    "type": "string",
                    "enum": ["note", "explanation", "example", "summary", "reference"],
                    "description": "Type of educational content"
                },
                "sections": {
                    "type": "array",
                    "description": "Content broken into sections",
                    "items": {
                        "type": "object",
                        "properties": {
                            "heading": {"type": "string"},
                            "body": {"type": "string", "description": "Markdown body"},
                            "code_example": {"type": "string"},
                            "language": {"type": "string"}
                        },
                        "required": ["heading", "body"]
                    }
                }
            },
            "required": ["title", "content_type", "sections"]
        })
    }

    fn handle(&self, input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async move {
            let title = require_str(&input, "title")?.to_string();
            let content_type = require_str(&input, "content_type")?;
            let content_id = format!("content_{}", uuid::Uuid::new_v4());

            let doc = json!({
                "content_id": content_id,
                "title": title,
                "content_type": content_type,
                "sections": input["sections"],
                "created_for_user": self.owner,
                "generated_by_ai": true,
                "created_at": Utc::now().to_rfc3339(),
            });
            self.store
                .insert("learning_content", doc)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            info!(%content_id, "Created learning content");

            Ok(json!({
                "success": true,
                "content_id": content_id,
                "message": format!("Content '{title}' created and ready to display"),
            }))
        })
    }
}

/// Persist a dynamically generated practice exercise
pub struct CreateExercise {
    store: Arc<dyn DocumentStore>,
    owner: String,
}

impl CreateExercise {
    pub fn new(store: Arc<dyn DocumentStore>, owner: String) -> Self {
        Self { store, owner }
    }
}

/// Normalize the model-supplied test cases. Accepts a JSON array or a
/// stringified array; falls back to a single placeholder test when absent.
fn normalize_test_cases(raw: &Value) -> Vec<Value> {
    let parsed = match raw {
        Value::Array(items) => items.clone(),
        Value::String(s) => serde_json::from_str::<Vec<Value>>(s).unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut cases: Vec<Value> = parsed
        .into_iter()
        .filter(|tc| tc["test_id"].is_string() && tc["validation_script"].is_string())
        .map(|tc| {
            json!({
                "test_id": tc["test_id"],
                "description": tc["description"],
                "input": tc.get("input").cloned().unwrap_or_else(|| json!({})),
                "expected_output": tc
                    .get("expected_output")
                    .cloned()
                    .unwrap_or_else(|| json!({"stdout": ""})),
                "validation_script": tc["validation_script"],
            })
        })
        .collect();

    if cases.is_empty() {
        cases.push(json!({
            "test_id": "test_1",
            "description": "Basic functionality test",
            "input": {},
            "expected_output": {"stdout": ""},
            "validation_script": "# Test execution",
        }));
    }
    cases
}

impl Tool for CreateExercise {
    fn name(&self) -> &str {
        "create_exercise"
    }

    fn description(&self) -> &str {
        "Generate a coding exercise based on the topic and the user's skill level. \
         Creates a new practice problem with test cases."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "description": {"type": "string"},
                "prompt": {"type": "string", "description": "Detailed instructions for the student"},
                "difficulty": {
                    "type": "string",
                    "enum": ["beginner", "intermediate", "advanced"]
                },
                "exercise_type": {
                    "type": "string",
                    "description": "Programming language or tool"
                },
                "starter_code": {"type": "string"},
                "solution": {"type": "string"},
                "test_cases": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "test_id": {"type": "string"},
                            "description": {"type": "string"},
                            "validation_script": {"type": "string"}
                        },
                        "required": ["test_id", "description", "validation_script"]
                    }
                },
                "node_id": {"type": "string", "description": "Associated learning node"}
            },
            "required": ["title", "description", "prompt", "difficulty", "exercise_type", "solution"]
        })
    }

    fn handle(&self, input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async move {
            let title = require_str(&input, "title")?.to_string();
            for field in ["description", "prompt", "difficulty", "exercise_type", "solution"] {
                require_str(&input, field)?;
            }
            let exercise_id = format!("ex_{}", uuid::Uuid::new_v4());

            let doc = json!({
                "exercise_id": exercise_id,
                "node_id": input["node_id"].as_str().unwrap_or("dynamic"),
                "title": title,
                "description": input["description"],
                "prompt": input["prompt"],
                "type": input["exercise_type"],
                "difficulty": input["difficulty"],
                "starter_code": input["starter_code"].as_str().unwrap_or("# Your code here"),
                "solution": input["solution"],
                "test_cases": normalize_test_cases(&input["test_cases"]),
                "generated_by_ai": true,
                "created_for_user": self.owner,
                "created_at": Utc::now().to_rfc3339(),
            });
            self.store
                .insert("exercises", doc)
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            info!(%exercise_id, "Created exercise");

            Ok(json!({
                "success": true,
                "exercise_id": exercise_id,
                "message": format!("Exercise '{title}' created and ready for practice"),
            }))
        })
    }
}
