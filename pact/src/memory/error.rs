//! Error types for the memory subsystem.

/// Error type for memory/session operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MemoryError {
    /// JSON serialization or deserialization of a message failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend encountered an error.
    #[error("[{backend}] {message}")]
    Storage {
        /// Backend identifier (e.g., `"memory"`).
        backend: &'static str,
        /// Human-readable error description.
        message: String,
    },
}

impl MemoryError {
    /// Creates a [`Storage`](Self::Storage) error for the given backend.
    #[must_use]
    pub fn storage(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            backend,
            message: message.into(),
        }
    }
}

/// Convenience alias for memory-scoped results.
pub type MemoryResult<T> = Result<T, MemoryError>;
