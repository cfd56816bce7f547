//! Runtime settings loaded from the environment.
//!
//! A `.env` file in the working directory is honored. RPC resolution order:
//!
//! 1. `SEPOLIA_RPC_URL`
//! 2. `INFURA_API_KEY`, expanded to the Infura Sepolia endpoint
//!
//! ```bash
//! export PRIVATE_KEY=0x...        # controller wallet
//! export PKP_ADD=0x04...          # PKP public key (uncompressed)
//! export INFURA_API_KEY=...       # or SEPOLIA_RPC_URL=https://...
//! ```

use std::str::FromStr;

use alloy::primitives::Address;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::chain::infura_sepolia_url;
use crate::custody::{CustodyNetwork, CustodySettings, SignerCell};
use crate::price::COINGECKO_API_URL;
use crate::safe::{SEPOLIA_TX_SERVICE_URL, SafeContracts};

/// Environment variable names.
pub mod env_vars {
    /// Controller wallet private key.
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    /// PKP public key.
    pub const PKP_ADD: &str = "PKP_ADD";
    /// Infura project key.
    pub const INFURA_API_KEY: &str = "INFURA_API_KEY";
    /// Explicit Sepolia RPC URL.
    pub const SEPOLIA_RPC_URL: &str = "SEPOLIA_RPC_URL";
    /// Ollama host.
    pub const OLLAMA_HOST: &str = "OLLAMA_HOST";
    /// Chat model name.
    pub const PACT_MODEL: &str = "PACT_MODEL";
    /// Custody network name or gateway URL.
    pub const LIT_NETWORK: &str = "LIT_NETWORK";
    /// Price API base URL.
    pub const COINGECKO_API_URL: &str = "COINGECKO_API_URL";
    /// Safe transaction service base URL.
    pub const SAFE_TX_SERVICE_URL: &str = "SAFE_TX_SERVICE_URL";
    /// Safe proxy factory override.
    pub const SAFE_PROXY_FACTORY: &str = "SAFE_PROXY_FACTORY";
    /// Safe singleton override.
    pub const SAFE_SINGLETON: &str = "SAFE_SINGLETON";
    /// Safe fallback handler override.
    pub const SAFE_FALLBACK_HANDLER: &str = "SAFE_FALLBACK_HANDLER";
}

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "mistral-nemo";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing configuration: {0}")]
    Missing(&'static str),

    /// A variable is set to something unusable.
    #[error("invalid value for {var}: {message}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What is wrong.
        message: String,
    },
}

/// Everything the agent needs from its environment.
#[derive(Debug)]
pub struct Settings {
    /// Controller wallet key.
    pub private_key: Option<SecretString>,
    /// PKP public key.
    pub pkp_public_key: Option<String>,
    /// Sepolia JSON-RPC endpoint.
    pub rpc_url: Option<String>,
    /// Ollama base URL.
    pub ollama_url: String,
    /// Chat model name.
    pub model: String,
    /// Custody network.
    pub custody_network: CustodyNetwork,
    /// Price API base URL.
    pub coingecko_url: String,
    /// Safe transaction service base URL.
    pub tx_service_url: String,
    /// Safe contract addresses.
    pub safe_contracts: SafeContracts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            private_key: None,
            pkp_public_key: None,
            rpc_url: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            custody_network: CustodyNetwork::default(),
            coingecko_url: COINGECKO_API_URL.to_string(),
            tx_service_url: SEPOLIA_TX_SERVICE_URL.to_string(),
            safe_contracts: SafeContracts::default(),
        }
    }
}

/// Prefix a scheme onto bare `host:port` values (Ollama's own convention).
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn parse_contract(var: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.trim().parse().map_err(|e| ConfigError::Invalid {
        var,
        message: format!("{e}"),
    })
}

impl Settings {
    /// Load `.env` (if present) and read the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for malformed values. Missing
    /// optional values fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for malformed values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self {
            private_key: get(env_vars::PRIVATE_KEY).map(SecretString::from),
            pkp_public_key: get(env_vars::PKP_ADD),
            ..Self::default()
        };

        settings.rpc_url = if let Some(url) = get(env_vars::SEPOLIA_RPC_URL) {
            debug!("using SEPOLIA_RPC_URL");
            Some(url)
        } else if let Some(key) = get(env_vars::INFURA_API_KEY) {
            debug!("building RPC URL from INFURA_API_KEY");
            Some(infura_sepolia_url(key.trim()))
        } else {
            None
        };

        if let Some(host) = get(env_vars::OLLAMA_HOST) {
            settings.ollama_url = normalize_host(&host);
        }
        if let Some(model) = get(env_vars::PACT_MODEL) {
            settings.model = model;
        }
        if let Some(network) = get(env_vars::LIT_NETWORK) {
            settings.custody_network =
                CustodyNetwork::from_str(&network).map_err(|e| ConfigError::Invalid {
                    var: env_vars::LIT_NETWORK,
                    message: e.to_string(),
                })?;
        }
        if let Some(url) = get(env_vars::COINGECKO_API_URL) {
            settings.coingecko_url = url;
        }
        if let Some(url) = get(env_vars::SAFE_TX_SERVICE_URL) {
            settings.tx_service_url = url;
        }
        if let Some(v) = get(env_vars::SAFE_PROXY_FACTORY) {
            settings.safe_contracts.proxy_factory =
                parse_contract(env_vars::SAFE_PROXY_FACTORY, &v)?;
        }
        if let Some(v) = get(env_vars::SAFE_SINGLETON) {
            settings.safe_contracts.singleton = parse_contract(env_vars::SAFE_SINGLETON, &v)?;
        }
        if let Some(v) = get(env_vars::SAFE_FALLBACK_HANDLER) {
            settings.safe_contracts.fallback_handler =
                parse_contract(env_vars::SAFE_FALLBACK_HANDLER, &v)?;
        }

        Ok(settings)
    }

    /// Override the RPC URL.
    #[must_use]
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// Override the Ollama URL.
    #[must_use]
    pub fn with_ollama_url(mut self, url: impl AsRef<str>) -> Self {
        self.ollama_url = normalize_host(url.as_ref());
        self
    }

    /// Override the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The Sepolia RPC URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if neither RPC variable is set.
    pub fn require_rpc_url(&self) -> Result<&str, ConfigError> {
        self.rpc_url
            .as_deref()
            .ok_or(ConfigError::Missing("SEPOLIA_RPC_URL or INFURA_API_KEY"))
    }

    /// Inputs for the custody flow.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] without a controller key.
    pub fn custody(&self) -> Result<CustodySettings, ConfigError> {
        let key = self
            .private_key
            .as_ref()
            .ok_or(ConfigError::Missing(env_vars::PRIVATE_KEY))?;
        let mut custody = CustodySettings::new(SecretString::from(key.expose_secret().to_string()))
            .network(self.custody_network.clone());
        if let Some(pkp) = &self.pkp_public_key {
            custody = custody.pkp_public_key(pkp.clone());
        }
        Ok(custody)
    }
}

impl Settings {
    /// The lazily initialized signer for these settings.
    ///
    /// Without a controller key the cell still exists, and every signing
    /// tool reports the missing variable when it is called.
    #[must_use]
    pub fn signer_cell(&self) -> SignerCell {
        match self.custody() {
            Ok(custody) => SignerCell::new(custody),
            Err(ConfigError::Missing(var) | ConfigError::Invalid { var, .. }) => {
                SignerCell::unconfigured(var)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.model, "mistral-nemo");
        assert_eq!(settings.ollama_url, "http://localhost:11434");
        assert_eq!(settings.custody_network, CustodyNetwork::DatilDev);
        assert!(settings.rpc_url.is_none());
        assert!(settings.require_rpc_url().is_err());
        assert!(settings.custody().is_err());
        assert_eq!(settings.safe_contracts, SafeContracts::SEPOLIA_V1_4_1);
    }

    #[test]
    fn test_rpc_priority() {
        let s = Settings::from_lookup(lookup(&[("INFURA_API_KEY", "abc")])).unwrap();
        assert_eq!(s.require_rpc_url().unwrap(), "https://sepolia.infura.io/v3/abc");

        let s = Settings::from_lookup(lookup(&[
            ("INFURA_API_KEY", "abc"),
            ("SEPOLIA_RPC_URL", "http://node:8545"),
        ]))
        .unwrap();
        assert_eq!(s.require_rpc_url().unwrap(), "http://node:8545");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let s = Settings::from_lookup(lookup(&[("PRIVATE_KEY", "  "), ("PKP_ADD", "")])).unwrap();
        assert!(s.private_key.is_none());
        assert!(s.pkp_public_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("OLLAMA_HOST", "127.0.0.1:11434"),
            ("PACT_MODEL", "llama3.1"),
            ("LIT_NETWORK", "datil-test"),
            ("SAFE_SINGLETON", "0x000000000000000000000000000000000000dEaD"),
        ]))
        .unwrap();
        assert_eq!(s.ollama_url, "http://127.0.0.1:11434");
        assert_eq!(s.model, "llama3.1");
        assert_eq!(s.custody_network, CustodyNetwork::DatilTest);
        assert_eq!(
            s.safe_contracts.singleton,
            "0x000000000000000000000000000000000000dEaD".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = Settings::from_lookup(lookup(&[("LIT_NETWORK", "moonbase")])).unwrap_err();
        assert!(err.to_string().contains("LIT_NETWORK"));
        assert!(Settings::from_lookup(lookup(&[("SAFE_PROXY_FACTORY", "0x12")])).is_err());
    }

    #[test]
    fn test_custody_settings() {
        let s = Settings::from_lookup(lookup(&[("PRIVATE_KEY", "0x01"), ("PKP_ADD", "0x04ab")]))
            .unwrap();
        let custody = s.custody().unwrap();
        assert_eq!(custody.pkp_public_key.as_deref(), Some("0x04ab"));
        assert_eq!(custody.controller_key.expose_secret(), "0x01");
        // Secrets stay out of debug output.
        assert!(!format!("{s:?}").contains("0x01"));
    }

    #[tokio::test]
    async fn test_signer_cell_without_key() {
        let cell = Settings::default().signer_cell();
        let err = cell.get().await.unwrap_err();
        assert_eq!(err.to_string(), "custody is not configured: PRIVATE_KEY is not set");
        assert!(!cell.is_initialized());
    }

    #[tokio::test]
    async fn test_signer_cell_local_fallback() {
        let key = "0x0000000000000000000000000000000000000000000000000000000000000001";
        let cell = Settings::from_lookup(lookup(&[("PRIVATE_KEY", key)]))
            .unwrap()
            .signer_cell();
        let signer = cell.get().await.unwrap();
        assert_eq!(signer.kind(), "local");
        assert_eq!(
            signer.address().to_string(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }
}
