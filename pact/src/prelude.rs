//! Common imports.

pub use crate::agent::{Agent, AgentReply, RunConfig, RunResult, Runner};
pub use crate::config::Settings;
pub use crate::custody::{SignerCell, SignerHandle};
pub use crate::error::{Error, Result, ToolError};
pub use crate::memory::{InMemoryStore, Session, SharedSession};
pub use crate::message::Message;
pub use crate::providers::{Model, OllamaClient, SharedModel};
pub use crate::tool::{BoxedTool, DynTool, Tool};
pub use crate::tools::ToolContext;
