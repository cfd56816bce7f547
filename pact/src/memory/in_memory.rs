//! In-process session storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::MemoryResult;
use super::session::{Session, SharedSession};
use crate::message::Message;

/// A [`Session`] kept in process memory.
#[derive(Debug)]
pub struct InMemorySession {
    id: String,
    messages: Mutex<Vec<Message>>,
}

impl InMemorySession {
    /// Create an empty session.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Session for InMemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_messages(&self, limit: Option<usize>) -> MemoryResult<Vec<Message>> {
        let messages = self.messages.lock().await;
        let start = limit.map_or(0, |n| messages.len().saturating_sub(n));
        Ok(messages[start..].to_vec())
    }

    async fn add_messages(&self, messages: &[Message]) -> MemoryResult<()> {
        self.messages.lock().await.extend_from_slice(messages);
        Ok(())
    }

    async fn clear(&self) -> MemoryResult<()> {
        self.messages.lock().await.clear();
        Ok(())
    }

    async fn len(&self) -> MemoryResult<usize> {
        Ok(self.messages.lock().await.len())
    }
}

/// Thread-id keyed store of in-memory sessions.
///
/// Plays the role of a conversation checkpointer: every call with the same
/// thread id sees the same history until the process exits.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: Mutex<HashMap<String, Arc<InMemorySession>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the session for `thread_id`.
    pub async fn session(&self, thread_id: &str) -> SharedSession {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(InMemorySession::new(thread_id)));
        Arc::clone(session) as SharedSession
    }

    /// Thread ids with a session.
    pub async fn thread_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop the session for `thread_id`; returns whether it existed.
    pub async fn remove(&self, thread_id: &str) -> bool {
        self.sessions.lock().await.remove(thread_id).is_some()
    }
}
