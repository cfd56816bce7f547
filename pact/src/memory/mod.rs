//! Conversation memory for agent runs.
//!
//! - **[`Session`]**: async history interface used by the runner.
//! - **[`InMemorySession`]**: a session kept in process memory.
//! - **[`InMemoryStore`]**: thread-id keyed sessions, the checkpointer the
//!   CLI uses so follow-up prompts in a thread see earlier turns.

mod error;
mod in_memory;
mod session;

pub use error::{MemoryError, MemoryResult};
pub use in_memory::{InMemorySession, InMemoryStore};
pub use session::{Session, SharedSession};
