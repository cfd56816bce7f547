//! Core session trait for conversation memory.
//!
//! History lives in the session, not in the agent: the same [`Agent`](crate::agent::Agent)
//! can serve many threads, each with its own [`Session`].

use async_trait::async_trait;

use super::error::MemoryResult;
use crate::message::Message;

/// Async trait for session-based conversation memory.
///
/// Stores a chronological sequence of [`Message`]s identified by a session id.
#[async_trait]
pub trait Session: Send + Sync {
    /// Returns the unique session identifier.
    fn id(&self) -> &str;

    /// Retrieves conversation history.
    ///
    /// - `limit: Some(n)` returns the **latest** `n` messages in chronological order.
    /// - `limit: None` returns all messages.
    async fn get_messages(&self, limit: Option<usize>) -> MemoryResult<Vec<Message>>;

    /// Appends messages to the conversation history in order.
    async fn add_messages(&self, messages: &[Message]) -> MemoryResult<()>;

    /// Removes all messages from this session.
    async fn clear(&self) -> MemoryResult<()>;

    /// Returns the number of stored messages.
    async fn len(&self) -> MemoryResult<usize>;

    /// Returns `true` if this session contains no messages.
    async fn is_empty(&self) -> MemoryResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// A shared, reference-counted session for use across tasks.
pub type SharedSession = std::sync::Arc<dyn Session>;
