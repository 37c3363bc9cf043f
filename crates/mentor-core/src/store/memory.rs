//! In-memory document store
//!
//! Backs tests and single-process embeddings. Locks are never held across an
//! await point, so the sync `parking_lot` primitives are safe here.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::error::Result;

use super::{DocumentStore, Message, MessageStore, Session, SessionStore};

/// In-memory implementation of the store traits
#[derive(Default)]
pub struct MemoryStore {
    /// Single mutex over all sessions makes find-or-create atomic
    sessions: Mutex<HashMap<String, Session>>,
    messages: RwLock<HashMap<String, Vec<Message>>>,
    collections: RwLock<HashMap<String, Vec<Value>>>,
    keyed: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All documents inserted into a collection, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// The upserted document stored under `key` in a collection
    pub fn keyed_document(&self, collection: &str, key: &str) -> Option<Value> {
        self.keyed
            .read()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    /// Total messages persisted for a session
    pub fn message_count(&self, session_id: &str) -> usize {
        self.messages
            .read()
            .get(session_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_or_create(
        &self,
        owner: &str,
        context_type: &str,
        context_id: Option<&str>,
    ) -> Result<Session> {
        let mut sessions = self.sessions.lock();

        // A keyless lookup matches any active session for (owner, context_type);
        // a keyed lookup requires an exact context_id match.
        let existing = sessions.values().find(|s| {
            s.active
                && s.owner == owner
                && s.context_type == context_type
                && match context_id {
                    Some(id) => s.context_id.as_deref() == Some(id),
                    None => true,
                }
        });
        if let Some(session) = existing {
            return Ok(session.clone());
        }

        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            context_type: context_type.to_string(),
            context_id: context_id.map(|s| s.to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        };
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn close(&self, session_id: &str) -> Result<()> {
        if let Some(session) = self.sessions.lock().get_mut(session_id) {
            session.active = false;
        }
        Ok(())
    }

    async fn touch(&self, session_id: &str) -> Result<()> {
        if let Some(session) = self.sessions.lock().get_mut(session_id) {
            session.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: Message) -> Result<()> {
        self.messages
            .write()
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Message>> {
        let messages = self.messages.read();
        let all = match messages.get(session_id) {
            Some(all) => all,
            None => return Ok(Vec::new()),
        };
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, doc: Value) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn upsert(&self, collection: &str, key: &str, doc: Value) -> Result<()> {
        self.keyed
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), doc);
        Ok(())
    }
}
