//! LLM provider implementations.
//!
//! Each provider implements the [`Model`] trait, so the
//! [`Runner`](crate::agent::Runner) never depends on a concrete API.
//!
//! # Supported Providers
//!
//! - **Ollama**: local inference (`mistral-nemo`, Llama, Qwen, ...)
//! - **Mock**: scripted responses for tests and offline runs
//!
//! # Example
//!
//! ```rust,ignore
//! use pact::providers::ollama::OllamaClient;
//!
//! let ollama = OllamaClient::new();
//! let model = ollama.completion_model("mistral-nemo");
//! ```

mod mock;
mod types;

pub mod ollama;

pub use mock::MockModel;
pub use ollama::OllamaClient;
pub use types::{GenerateOptions, ModelResponse, TokenUsage, ToolChoice};

use async_trait::async_trait;

use crate::error::LlmError;
use crate::message::Message;

/// The core trait for language model implementations.
#[async_trait]
pub trait Model: Send + Sync {
    /// Model identifier (e.g., "mistral-nemo").
    fn model_id(&self) -> &str;

    /// Generate a response for the given messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or the response cannot be parsed.
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError>;

    /// Whether the model supports native tool calling.
    fn supports_tool_calling(&self) -> bool {
        true
    }

    /// Provider name (e.g., "ollama").
    fn provider(&self) -> &'static str {
        "unknown"
    }
}

/// A shared, type-erased model.
pub type SharedModel = std::sync::Arc<dyn Model>;

/// Safely convert u64 to u32, saturating at `u32::MAX` if overflow.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn saturating_u32(value: u64) -> u32 {
    if value > u32::MAX as u64 {
        u32::MAX
    } else {
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_u32() {
        assert_eq!(saturating_u32(0), 0);
        assert_eq!(saturating_u32(100), 100);
        assert_eq!(saturating_u32(u64::from(u32::MAX)), u32::MAX);
        assert_eq!(saturating_u32(u64::MAX), u32::MAX);
    }
}
