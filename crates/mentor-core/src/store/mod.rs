//! Document store contracts
//!
//! The engine consumes and produces documents through narrow traits; the
//! storage engine behind them is external. [`memory::MemoryStore`] is the
//! in-process implementation used by tests and embedders.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Unique identifier for a session
pub type SessionId = String;

/// A persisted conversation thread scoped to an owner and an application
/// context (e.g. a learning node or an exercise)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner: String,
    pub context_type: String,
    pub context_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role of a persisted message
///
/// Only externally visible turns are persisted; intermediate tool exchanges
/// live in the transient transcript and never become messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One persisted message within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: SessionId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: impl Into<SessionId>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Store for session documents
///
/// `find_or_create` must be atomic: concurrent callers with the same key
/// converge on a single session rather than creating duplicates.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_or_create(
        &self,
        owner: &str,
        context_type: &str,
        context_id: Option<&str>,
    ) -> Result<Session>;

    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Mark a session inactive; idempotent on repeated calls
    async fn close(&self, session_id: &str) -> Result<()>;

    /// Bump the session's `updated_at`
    async fn touch(&self, session_id: &str) -> Result<()>;
}

/// Store for message documents
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: Message) -> Result<()>;

    /// The last `limit` messages of a session, oldest-first
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Message>>;
}

/// Store for tool-produced documents (content, exercises, progress,
/// behavioral events), keyed by collection name
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a document to a collection
    async fn insert(&self, collection: &str, doc: Value) -> Result<()>;

    /// Insert or replace the document stored under `key` in a collection
    async fn upsert(&self, collection: &str, key: &str, doc: Value) -> Result<()>;
}
