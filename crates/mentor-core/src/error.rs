//! Error types for Mentor Core

use thiserror::Error;

/// Result type alias using Mentor Error
pub type Result<T> = std::result::Result<T, Error>;

/// Mentor error types
///
/// Tool-level failures are deliberately absent from the fatal paths: they are
/// converted into model-visible error result blocks by the gateway and never
/// abort a turn. Provider failures, by contrast, are fatal to the current turn
/// and propagate to the caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

/// Tool-specific errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Result not transcript-embeddable: {0}")]
    MalformedResult(String),

    #[error("Tool timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
