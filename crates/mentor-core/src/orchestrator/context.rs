//! Structured turn context
//!
//! Callers attach application state (current exercise, topic, the user's
//! code, test results, progress) to a turn. The orchestrator renders it as a
//! text block appended after the base system instructions — never before.

use serde::{Deserialize, Serialize};

/// Structured context supplied with a turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnContext {
    pub exercise: Option<ExerciseContext>,
    /// Title of the learning node the user is on
    pub topic: Option<String>,
    /// The user's current code, verbatim
    pub user_code: Option<String>,
    pub test_results: Option<TestResults>,
    pub progress: Option<ProgressSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseContext {
    pub title: String,
    pub description: String,
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestResults {
    pub passed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSummary {
    pub nodes_completed: u32,
}

impl TurnContext {
    pub fn is_empty(&self) -> bool {
        self.exercise.is_none()
            && self.topic.is_none()
            && self.user_code.is_none()
            && self.test_results.is_none()
            && self.progress.is_none()
    }

    /// Render the context block appended to the system instructions
    pub fn render(&self) -> String {
        let mut parts = vec!["CURRENT CONTEXT:".to_string()];

        if let Some(ex) = &self.exercise {
            parts.push(format!("Exercise: {}", ex.title));
            parts.push(format!("Description: {}", ex.description));
            if let Some(difficulty) = &ex.difficulty {
                parts.push(format!("Difficulty: {difficulty}"));
            }
        }

        if let Some(topic) = &self.topic {
            parts.push(format!("Topic: {topic}"));
        }

        if let Some(code) = &self.user_code {
            parts.push(format!("\nUser's current code:\n```\n{code}\n```"));
        }

        if let Some(results) = &self.test_results {
            parts.push(format!(
                "\nTest Results: {}/{} passed",
                results.passed, results.total
            ));
        }

        if let Some(progress) = &self.progress {
            parts.push(format!(
                "User Progress: {} nodes completed",
                progress.nodes_completed
            ));
        }

        parts.join("\n")
    }
}
