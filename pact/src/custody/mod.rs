//! Key custody: authenticate a controller wallet with the custody network and
//! obtain a signer handle for a PKP.
//!
//! The flow is:
//!
//! 1. handshake with the network ([`CustodyClient::handshake`])
//! 2. sign a SIWE message carrying a ReCap resource with the controller key
//!    ([`AuthSig::sign`])
//! 3. trade the auth signature for session signatures
//!    ([`CustodyClient::sign_session_key`])
//! 4. wrap the PKP and session in a [`PkpSigner`]
//!
//! [`SignerCell`] runs the flow at most once per process and hands out the
//! cached handle afterwards.

mod client;
mod pkp;
mod siwe;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Signature, hex};
use alloy::signers::local::PrivateKeySigner;
use chrono::{SecondsFormat, TimeDelta, Utc};
use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

pub use client::{CustodyClient, Handshake, SessionRequest, SessionSigs};
pub use pkp::{PkpSigner, SignerHandle, address_from_public_key};
pub use siwe::{Ability, AuthSig, ResourceAbility, SiweMessage, generate_nonce, recap_uri};

/// Errors from the custody flow.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CustodyError {
    /// A required setting is absent.
    #[error("custody is not configured: {0} is not set")]
    NotConfigured(&'static str),

    /// The controller private key could not be parsed.
    #[error("invalid controller private key")]
    InvalidKey,

    /// The PKP public key is malformed.
    #[error("invalid PKP public key: {0}")]
    InvalidPublicKey(String),

    /// Unknown custody network name.
    #[error("unknown custody network '{0}'")]
    UnknownNetwork(String),

    /// The request never got a response.
    #[error("custody transport error: {0}")]
    Transport(String),

    /// The network answered with a non-success status.
    #[error("custody network returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response did not have the expected shape.
    #[error("malformed custody response: {0}")]
    Malformed(String),

    /// Producing or decoding a signature failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Custody network to authenticate against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum CustodyNetwork {
    /// Development network.
    #[default]
    DatilDev,
    /// Test network.
    DatilTest,
    /// Production network.
    Datil,
    /// Self-hosted gateway at the given URL.
    Custom(String),
}

impl CustodyNetwork {
    /// Network name used in session URIs.
    #[must_use]
    pub const fn name(&self) -> &str {
        match self {
            Self::DatilDev => "datil-dev",
            Self::DatilTest => "datil-test",
            Self::Datil => "datil",
            Self::Custom(_) => "custom",
        }
    }

    /// Base URL of the network gateway.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match self {
            Self::DatilDev => "https://datil-dev.litgateway.com",
            Self::DatilTest => "https://datil-test.litgateway.com",
            Self::Datil => "https://datil.litgateway.com",
            Self::Custom(url) => url,
        }
    }
}

impl fmt::Display for CustodyNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(url) => write!(f, "custom({url})"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for CustodyNetwork {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "datil-dev" | "datildev" => Ok(Self::DatilDev),
            "datil-test" | "datiltest" => Ok(Self::DatilTest),
            "datil" => Ok(Self::Datil),
            _ if s.starts_with("http://") || s.starts_with("https://") => {
                Ok(Self::Custom(s.to_string()))
            }
            _ => Err(CustodyError::UnknownNetwork(s.to_string())),
        }
    }
}

/// Decode a 65-byte hex signature (`r || s || v`, `v` in 0/1 or 27/28).
///
/// # Errors
///
/// Returns [`CustodyError::Signing`] if the input is not a valid signature.
pub fn parse_signature(input: &str) -> Result<Signature, CustodyError> {
    let bytes = hex::decode(input.trim())
        .map_err(|e| CustodyError::Signing(format!("signature is not hex: {e}")))?;
    Signature::from_raw(&bytes).map_err(|e| CustodyError::Signing(format!("bad signature: {e}")))
}

/// Parse the controller key without echoing it back in errors.
///
/// # Errors
///
/// Returns [`CustodyError::InvalidKey`].
pub fn parse_controller_key(key: &SecretString) -> Result<PrivateKeySigner, CustodyError> {
    key.expose_secret()
        .trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| CustodyError::InvalidKey)
}

/// Inputs of the custody flow.
#[derive(Debug)]
pub struct CustodySettings {
    /// Controller wallet key that owns the PKP.
    pub controller_key: SecretString,
    /// Uncompressed PKP public key. Without one the controller key signs
    /// directly.
    pub pkp_public_key: Option<String>,
    /// Network to authenticate against.
    pub network: CustodyNetwork,
    /// Lifetime of the session capability.
    pub session_ttl: TimeDelta,
}

impl CustodySettings {
    /// Settings for `controller_key` on the default network, one-hour sessions.
    #[must_use]
    pub fn new(controller_key: SecretString) -> Self {
        Self {
            controller_key,
            pkp_public_key: None,
            network: CustodyNetwork::default(),
            session_ttl: TimeDelta::hours(1),
        }
    }

    /// Set the PKP public key.
    #[must_use]
    pub fn pkp_public_key(mut self, key: impl Into<String>) -> Self {
        self.pkp_public_key = Some(key.into());
        self
    }

    /// Set the network.
    #[must_use]
    pub fn network(mut self, network: CustodyNetwork) -> Self {
        self.network = network;
        self
    }

    /// Set the session lifetime.
    #[must_use]
    pub const fn session_ttl(mut self, ttl: TimeDelta) -> Self {
        self.session_ttl = ttl;
        self
    }
}

/// Run the full custody flow and return a signer handle.
///
/// # Errors
///
/// Fails on a bad controller or PKP key, or on any custody network error.
#[instrument(skip_all, fields(network = %settings.network))]
pub async fn initialize_signer(settings: &CustodySettings) -> Result<SignerHandle, CustodyError> {
    let controller = parse_controller_key(&settings.controller_key)?;

    let Some(pkp_public_key) = settings
        .pkp_public_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    else {
        warn!(
            address = %controller.address(),
            "no PKP public key configured, signing with the controller key"
        );
        return Ok(SignerHandle::Local(controller));
    };
    // Fail before any network traffic.
    address_from_public_key(pkp_public_key)?;

    let client = CustodyClient::new(settings.network.clone());
    let handshake = client.handshake().await?;
    let nonce = handshake
        .latest_blockhash
        .filter(|h| !h.is_empty())
        .unwrap_or_else(generate_nonce);

    let expiration = Utc::now() + settings.session_ttl;
    let request = SessionRequest {
        chain: "ethereum".into(),
        expiration: expiration.to_rfc3339_opts(SecondsFormat::Millis, true),
        resource_ability_requests: vec![ResourceAbility::pkp_signing_any()],
    };
    let message = SiweMessage::for_session(
        controller.address(),
        client.session_uri(),
        nonce,
        expiration,
        &request.resource_ability_requests,
    );
    let auth_sig = AuthSig::sign(&controller, &message).await?;
    let session = client
        .sign_session_key(&auth_sig, pkp_public_key, &request)
        .await?;
    info!(nodes = session.len(), "session signatures obtained");

    Ok(SignerHandle::Pkp(PkpSigner::new(client, pkp_public_key, session)?))
}

type Initializer =
    Box<dyn Fn() -> BoxFuture<'static, Result<SignerHandle, CustodyError>> + Send + Sync>;

/// Single-slot, lazily initialized signer cache.
///
/// The first [`get`](Self::get) runs the initializer; concurrent callers wait
/// for that run. A failed run leaves the cell empty, so a later call retries.
/// Once set, the handle is reused until the process exits.
pub struct SignerCell {
    cell: OnceCell<Arc<SignerHandle>>,
    init: Initializer,
}

impl fmt::Debug for SignerCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerCell")
            .field("signer", &self.cell.get().map(|s| s.address()))
            .finish_non_exhaustive()
    }
}

impl SignerCell {
    /// A cell that runs [`initialize_signer`] with `settings`.
    #[must_use]
    pub fn new(settings: CustodySettings) -> Self {
        let settings = Arc::new(settings);
        Self::with_initializer(move || {
            let settings = Arc::clone(&settings);
            async move { initialize_signer(&settings).await }
        })
    }

    /// A cell with a custom initializer.
    pub fn with_initializer<F, Fut>(init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SignerHandle, CustodyError>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(move || Box::pin(init())),
        }
    }

    /// A cell whose every `get` fails because `var` is not set.
    #[must_use]
    pub fn unconfigured(var: &'static str) -> Self {
        Self::with_initializer(move || async move { Err(CustodyError::NotConfigured(var)) })
    }

    /// A cell that already holds `handle`.
    #[must_use]
    pub fn preset(handle: SignerHandle) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Arc::new(handle))),
            init: Box::new(|| {
                Box::pin(async { Err(CustodyError::Signing("signer cell was preset".into())) })
            }),
        }
    }

    /// Get the signer, initializing it on first use.
    ///
    /// # Errors
    ///
    /// Returns the initializer's error; the cell stays empty in that case.
    pub async fn get(&self) -> Result<Arc<SignerHandle>, CustodyError> {
        let handle = self
            .cell
            .get_or_try_init(|| async {
                let handle = (self.init)().await?;
                info!(address = %handle.address(), kind = handle.kind(), "signer initialized");
                Ok::<_, CustodyError>(Arc::new(handle))
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    /// Whether a signer is cached.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_network_parse() {
        assert_eq!("datil-dev".parse::<CustodyNetwork>().unwrap(), CustodyNetwork::DatilDev);
        assert_eq!("DATIL".parse::<CustodyNetwork>().unwrap(), CustodyNetwork::Datil);
        assert_eq!(
            "https://gw.local/".parse::<CustodyNetwork>().unwrap(),
            CustodyNetwork::Custom("https://gw.local/".into())
        );
        assert!("mainnet".parse::<CustodyNetwork>().is_err());
        assert_eq!(CustodyNetwork::default().name(), "datil-dev");
    }

    #[test]
    fn test_custom_network_client_trims_slash() {
        let client = CustodyClient::new(CustodyNetwork::Custom("https://gw.local/".into()));
        assert_eq!(client.session_uri(), "lit:session:custom");
    }

    #[test]
    fn test_parse_controller_key_hides_input() {
        let err = parse_controller_key(&SecretString::from("0xnot-a-key".to_string())).unwrap_err();
        assert!(!err.to_string().contains("not-a-key"));

        let key = PrivateKeySigner::random();
        let hex = format!("0x{}", hex::encode(key.to_bytes()));
        let parsed = parse_controller_key(&SecretString::from(hex)).unwrap();
        assert_eq!(parsed.address(), key.address());
    }

    #[tokio::test]
    async fn test_initialize_without_pkp_uses_controller() {
        let key = PrivateKeySigner::random();
        let settings = CustodySettings::new(SecretString::from(hex::encode(key.to_bytes())));
        let handle = initialize_signer(&settings).await.unwrap();
        assert_eq!(handle.kind(), "local");
        assert_eq!(handle.address(), key.address());
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_pkp_before_network() {
        let key = PrivateKeySigner::random();
        let settings = CustodySettings::new(SecretString::from(hex::encode(key.to_bytes())))
            .pkp_public_key("0x04dead")
            .network(CustodyNetwork::Custom("http://127.0.0.1:9".into()));
        let err = initialize_signer(&settings).await.unwrap_err();
        assert!(matches!(err, CustodyError::InvalidPublicKey(_)));
    }

    #[tokio::test]
    async fn test_cell_initializes_once_under_contention() {
        let calls = Arc::new(AtomicUsize::new(0));
        let key = PrivateKeySigner::random();
        let counter = Arc::clone(&calls);
        let cell = Arc::new(SignerCell::with_initializer(move || {
            let counter = Arc::clone(&counter);
            let key = key.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(SignerHandle::Local(key))
            }
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move { cell.get().await.unwrap().address() })
            })
            .collect();
        let addresses = futures::future::join_all(handles).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = addresses[0].as_ref().unwrap();
        assert!(addresses.iter().all(|a| a.as_ref().unwrap() == first));
        assert!(cell.is_initialized());
    }

    #[tokio::test]
    async fn test_cell_retries_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cell = SignerCell::with_initializer(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(CustodyError::Transport("unreachable".into()))
                } else {
                    Ok(SignerHandle::Local(PrivateKeySigner::random()))
                }
            }
        });

        assert!(cell.get().await.is_err());
        assert!(!cell.is_initialized());
        let first = cell.get().await.unwrap().address();
        let again = cell.get().await.unwrap().address();
        assert_eq!(first, again);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preset_cell() {
        let key = PrivateKeySigner::random();
        let cell = SignerCell::preset(SignerHandle::Local(key.clone()));
        assert!(cell.is_initialized());
        assert_eq!(cell.get().await.unwrap().address(), key.address());
    }
}
