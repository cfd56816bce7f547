//! Unified error types for pact.
//!
//! This module provides the error hierarchy covering:
//! - LLM provider errors (transport, HTTP status, malformed responses)
//! - Tool execution errors
//! - Agent runtime errors
//!
//! Domain errors for custody, Safe and configuration live next to their
//! modules and fold into [`Error`] through `#[from]`.

use std::fmt;

/// Result type alias for pact operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for pact.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Memory/session error.
    #[error("Memory error: {0}")]
    Memory(#[from] crate::memory::MemoryError),

    /// Key-custody error.
    #[error("Custody error: {0}")]
    Custody(#[from] crate::custody::CustodyError),

    /// Safe multisig error.
    #[error("Safe error: {0}")]
    Safe(#[from] crate::safe::SafeError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Agent runtime error.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Maximum steps reached during agent execution.
    #[error("Maximum steps ({max_steps}) reached without final answer")]
    MaxSteps {
        /// The maximum number of steps configured.
        max_steps: usize,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an agent error with a message.
    #[must_use]
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a max steps error.
    #[must_use]
    pub const fn max_steps(max_steps: usize) -> Self {
        Self::MaxSteps { max_steps }
    }
}

/// Error type for LLM provider operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmError {
    /// The error kind.
    pub kind: LlmErrorKind,
    /// The provider name (e.g., "ollama").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// Optional error code from the provider.
    pub code: Option<String>,
}

/// Categories of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LlmErrorKind {
    /// Response format error.
    ResponseFormat,
    /// Network or connection error.
    Network,
    /// HTTP status error.
    HttpStatus,
    /// Provider-specific error.
    Provider,
    /// A scripted or mock model ran out of responses.
    Exhausted,
}

impl LlmError {
    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ResponseFormat,
            provider: None,
            message: format!("Expected {}, got {}", expected.into(), got.into()),
            code: None,
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Network,
            provider: None,
            message: message.into(),
            code: None,
        }
    }

    /// Create an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::HttpStatus,
            provider: None,
            message: format!("HTTP {status}: {}", body.into()),
            code: Some(status.to_string()),
        }
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Provider,
            provider: Some(provider.into()),
            message: message.into(),
            code: None,
        }
    }

    /// Create an exhausted error for scripted models.
    #[must_use]
    pub fn exhausted(provider: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Exhausted,
            provider: Some(provider.into()),
            message: "no scripted responses left".into(),
            code: None,
        }
    }

    /// Attach the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Error type for tool execution failures.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// Error during tool execution.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Invalid arguments provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Generic error.
    #[error("Tool error: {0}")]
    Other(String),
}

impl ToolError {
    /// Create an execution error.
    #[must_use]
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }
}

impl From<String> for ToolError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for ToolError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

impl From<crate::custody::CustodyError> for ToolError {
    fn from(err: crate::custody::CustodyError) -> Self {
        Self::Execution(err.to_string())
    }
}

impl From<crate::safe::SafeError> for ToolError {
    fn from(err: crate::safe::SafeError) -> Self {
        Self::Execution(err.to_string())
    }
}

impl From<crate::chain::ChainError> for ToolError {
    fn from(err: crate::chain::ChainError) -> Self {
        match err {
            crate::chain::ChainError::InvalidAddress(_) => Self::InvalidArguments(err.to_string()),
            crate::chain::ChainError::Rpc(_) => Self::Execution(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::http_status(500, "boom").with_provider("ollama");
        assert_eq!(err.to_string(), "[ollama] HTTP 500: boom (code: 500)");
        assert_eq!(err.kind, LlmErrorKind::HttpStatus);
        assert_eq!(LlmError::network("reset").kind, LlmErrorKind::Network);
    }

    #[test]
    fn test_tool_error_from_json() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: ToolError = json_err.into();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_error_wraps_tool_error() {
        let err: Error = ToolError::invalid_args("Invalid address.").into();
        assert_eq!(err.to_string(), "Tool error: Invalid arguments: Invalid address.");
    }
}
