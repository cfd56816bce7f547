//! ETH/USD price lookup against the CoinGecko simple-price API.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ToolError;

/// Public CoinGecko API.
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Extract `ethereum.usd` from a simple-price response.
///
/// # Errors
///
/// Returns [`ToolError::Execution`] if the field is missing or not a number.
pub fn parse_eth_usd(body: &Value) -> Result<f64, ToolError> {
    body.get("ethereum")
        .and_then(|e| e.get("usd"))
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::execution(format!("unexpected price response: {body}")))
}

/// Client for the price API.
#[derive(Debug, Clone)]
pub struct PriceClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for PriceClient {
    fn default() -> Self {
        Self::new(COINGECKO_API_URL)
    }
}

impl PriceClient {
    /// Create a client for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Request URL for the ETH price in USD.
    #[must_use]
    pub fn eth_usd_url(&self) -> String {
        format!(
            "{}/simple/price?ids=ethereum&vs_currencies=usd",
            self.base_url
        )
    }

    /// Current ETH price in USD.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures, non-success status, or an
    /// unexpected body.
    #[instrument(skip(self))]
    pub async fn eth_usd(&self) -> Result<f64, ToolError> {
        let url = self.eth_usd_url();
        let response = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ToolError::execution(format!("price request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::execution(format!(
                "price API returned HTTP {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::execution(format!("invalid price response: {e}")))?;
        let price = parse_eth_usd(&body)?;
        debug!(price, "fetched ETH price");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_eth_usd() {
        let price = parse_eth_usd(&json!({"ethereum": {"usd": 3120.55}})).unwrap();
        assert!((price - 3120.55).abs() < 1e-9);
        let price = parse_eth_usd(&json!({"ethereum": {"usd": 3000}})).unwrap();
        assert!((price - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_eth_usd_missing() {
        assert!(parse_eth_usd(&json!({})).is_err());
        assert!(parse_eth_usd(&json!({"ethereum": {}})).is_err());
        assert!(parse_eth_usd(&json!({"ethereum": {"usd": "3000"}})).is_err());
        assert!(parse_eth_usd(&json!({"status": {"error_code": 429}})).is_err());
    }

    #[test]
    fn test_url() {
        let client = PriceClient::new("http://localhost:9000/");
        assert_eq!(
            client.eth_usd_url(),
            "http://localhost:9000/simple/price?ids=ethereum&vs_currencies=usd"
        );
        assert!(PriceClient::default().eth_usd_url().starts_with(COINGECKO_API_URL));
    }
}
