//! Ollama API client implementation.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use super::completion::CompletionModel;
use crate::error::LlmError;

/// Default Ollama API base URL (local server).
pub const OLLAMA_API_BASE_URL: &str = "http://localhost:11434";

/// Ollama API client for creating completion models.
///
/// # Example
///
/// ```rust,ignore
/// use pact::providers::ollama::OllamaClient;
///
/// let client = OllamaClient::builder()
///     .base_url("http://192.168.1.100:11434")
///     .build()?;
///
/// let model = client.completion_model("mistral-nemo");
/// ```
#[derive(Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: Arc<str>,
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaClient {
    /// Create a client for `http://localhost:11434`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: OLLAMA_API_BASE_URL.into(),
        }
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> OllamaClientBuilder {
        OllamaClientBuilder::default()
    }

    /// Create a completion model with the specified model ID.
    #[must_use]
    pub fn completion_model(&self, model_id: impl Into<String>) -> CompletionModel {
        CompletionModel::new(self.clone(), model_id)
    }

    /// Server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(super) const fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub(super) fn headers() -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Check if the Ollama server is running and accessible.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not reachable.
    pub async fn health_check(&self) -> Result<bool, LlmError> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    /// List models available on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        Ok(response["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Builder for [`OllamaClient`].
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl OllamaClientBuilder {
    /// Set a custom base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout in seconds.
    ///
    /// Default is no timeout (inference can be slow).
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = Some(timeout);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<OllamaClient, LlmError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| OLLAMA_API_BASE_URL.to_string());

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(timeout));
        }
        let http_client = builder.build().map_err(|e| {
            LlmError::provider("ollama", format!("failed to build HTTP client: {e}"))
        })?;

        Ok(OllamaClient {
            http_client,
            base_url: base_url.trim_end_matches('/').into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_trims_trailing_slash() {
        let client = OllamaClient::builder()
            .base_url("http://10.0.0.2:11434/")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://10.0.0.2:11434");
        assert_eq!(OllamaClient::new().base_url(), OLLAMA_API_BASE_URL);
    }
}
