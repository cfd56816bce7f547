//! Safe transaction service client (pending multisig transactions).

use alloy::primitives::Address;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::SafeError;

/// Public Safe transaction service for Sepolia.
pub const SEPOLIA_TX_SERVICE_URL: &str = "https://safe-transaction-sepolia.safe.global";

/// A multisig transaction proposed to a Safe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    /// Safe transaction hash.
    pub safe_tx_hash: String,
    /// Target address.
    #[serde(default)]
    pub to: Option<String>,
    /// Wei value as a decimal string.
    #[serde(default)]
    pub value: Option<String>,
    /// Safe nonce.
    #[serde(default)]
    pub nonce: Option<u64>,
    /// Confirmations required to execute.
    #[serde(default)]
    pub confirmations_required: Option<u64>,
    /// Confirmations collected so far.
    #[serde(default)]
    pub confirmations: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    results: Vec<PendingTransaction>,
}

/// Parse a `multisig-transactions` page.
///
/// # Errors
///
/// Returns [`SafeError::Service`] if the body is not a transaction page.
pub fn parse_pending(body: &str) -> Result<Vec<PendingTransaction>, SafeError> {
    let page: Page = serde_json::from_str(body)
        .map_err(|e| SafeError::Service(format!("unexpected response: {e}")))?;
    debug!(count = ?page.count, returned = page.results.len(), "pending transactions page");
    Ok(page.results)
}

/// Client for the transaction service REST API.
#[derive(Debug, Clone)]
pub struct TxServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl TxServiceClient {
    /// Create a client for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL listing the unexecuted transactions of `safe`.
    #[must_use]
    pub fn pending_url(&self, safe: Address) -> String {
        format!(
            "{}/api/v1/safes/{}/multisig-transactions/?executed=false",
            self.base_url,
            safe.to_checksum(None)
        )
    }

    /// Unexecuted multisig transactions of `safe`.
    ///
    /// # Errors
    ///
    /// Returns [`SafeError::Service`] on transport, status or decoding
    /// failures.
    #[instrument(skip(self), fields(safe = %safe))]
    pub async fn pending_transactions(
        &self,
        safe: Address,
    ) -> Result<Vec<PendingTransaction>, SafeError> {
        let url = self.pending_url(safe);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SafeError::Service(format!("request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SafeError::Service(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(SafeError::Service(format!("HTTP {status}: {body}")));
        }
        parse_pending(&body)
    }
}

impl Default for TxServiceClient {
    fn default() -> Self {
        Self::new(SEPOLIA_TX_SERVICE_URL)
    }
}
