//! Session registry and history access
//!
//! Thin layer over the store traits: resolving a session for a context key,
//! and loading the bounded history window the orchestrator feeds to the model.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::provider::TranscriptMessage;
use crate::store::{Message, MessageRole, SessionId, SessionStore};

/// Resolves or creates the conversation session for a context key
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Look up the active session for (owner, context_type, context_id),
    /// creating one atomically if absent. Concurrent callers for the same
    /// key converge on one session id.
    pub async fn find_or_create(
        &self,
        owner: &str,
        context_type: &str,
        context_id: Option<&str>,
    ) -> Result<SessionId> {
        let session = self
            .store
            .find_or_create(owner, context_type, context_id)
            .await?;
        debug!(session_id = %session.id, owner, context_type, "Resolved session");
        Ok(session.id)
    }

    /// Mark a session inactive. Idempotent: closing an already-closed or
    /// unknown session is not an error.
    pub async fn close(&self, session_id: &str) -> Result<()> {
        self.store.close(session_id).await
    }
}

/// Loads a bounded, chronologically ordered window of prior messages
pub struct HistoryAccessor {
    store: Arc<dyn crate::store::MessageStore>,
}

impl HistoryAccessor {
    pub fn new(store: Arc<dyn crate::store::MessageStore>) -> Self {
        Self { store }
    }

    /// The last `limit` messages of a session, oldest-first
    pub async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Message>> {
        self.store.recent(session_id, limit).await
    }

    /// Convert persisted messages into the model-facing transcript
    pub fn to_transcript(messages: &[Message]) -> Vec<TranscriptMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                MessageRole::User => TranscriptMessage::User {
                    content: m.content.clone(),
                },
                MessageRole::Assistant => TranscriptMessage::Assistant {
                    content: m.content.clone(),
                },
            })
            .collect()
    }
}
