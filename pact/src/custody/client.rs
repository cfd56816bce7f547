//! HTTP client for the key-custody network.
//!
//! Three calls make up the whole surface:
//!
//! - `POST /web/handshake`: liveness plus the latest blockhash used as a
//!   SIWE nonce
//! - `POST /web/sign_session_key`: exchange an [`AuthSig`] for session
//!   signatures (the capability)
//! - `POST /web/pkp/sign`: sign a 32-byte digest with a PKP

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::{B256, Signature, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::siwe::{AuthSig, ResourceAbility};
use super::{CustodyError, CustodyNetwork, parse_signature};

/// Response to a handshake.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Latest blockhash seen by the network, when reported.
    #[serde(default)]
    pub latest_blockhash: Option<String>,
}

/// What a session is allowed to do and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Chain the SIWE auth is bound to (e.g. `ethereum`).
    pub chain: String,
    /// RFC 3339 expiration.
    pub expiration: String,
    /// Requested capabilities.
    pub resource_ability_requests: Vec<ResourceAbility>,
}

/// Session signatures returned by the custody network, keyed by node URL.
///
/// This is the capability token presented on every PKP signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSigs(pub BTreeMap<String, AuthSig>);

impl SessionSigs {
    /// Number of node signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no node signed the session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionKeyBody<'a> {
    auth_sig: &'a AuthSig,
    pkp_public_key: &'a str,
    #[serde(flatten)]
    request: &'a SessionRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionKeyResponse {
    session_sigs: SessionSigs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PkpSignBody<'a> {
    to_sign: Vec<u8>,
    pubkey: &'a str,
    session_sigs: &'a SessionSigs,
}

/// Custody network client.
#[derive(Clone)]
pub struct CustodyClient {
    http: reqwest::Client,
    network: CustodyNetwork,
    base_url: Arc<str>,
}

impl std::fmt::Debug for CustodyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyClient")
            .field("network", &self.network)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CustodyClient {
    /// Create a client for `network`.
    #[must_use]
    pub fn new(network: CustodyNetwork) -> Self {
        Self::with_http(network, reqwest::Client::new())
    }

    /// Create a client with a preconfigured HTTP client.
    #[must_use]
    pub fn with_http(network: CustodyNetwork, http: reqwest::Client) -> Self {
        let base_url: Arc<str> = network.base_url().trim_end_matches('/').into();
        Self {
            http,
            network,
            base_url,
        }
    }

    /// The network this client talks to.
    #[must_use]
    pub const fn network(&self) -> &CustodyNetwork {
        &self.network
    }

    /// URI the SIWE session message is issued for.
    #[must_use]
    pub fn session_uri(&self) -> String {
        format!("lit:session:{}", self.network.name())
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value, CustodyError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "custody request");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CustodyError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CustodyError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CustodyError::Malformed(format!("{url}: {e}")))
    }

    /// Connect to the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unreachable or answers badly.
    #[instrument(skip(self), fields(network = %self.network.name()))]
    pub async fn handshake(&self) -> Result<Handshake, CustodyError> {
        let challenge = format!("{:016x}{:016x}", fastrand::u64(..), fastrand::u64(..));
        let body = serde_json::json!({
            "clientPublicKey": "pact",
            "challenge": challenge,
        });
        let value = self.post("/web/handshake", &body).await?;
        serde_json::from_value(value).map_err(|e| CustodyError::Malformed(e.to_string()))
    }

    /// Exchange a controller auth signature for session signatures.
    ///
    /// # Errors
    ///
    /// Returns an error if the network rejects the signature or answers
    /// without any session signature.
    #[instrument(skip_all, fields(network = %self.network.name()))]
    pub async fn sign_session_key(
        &self,
        auth_sig: &AuthSig,
        pkp_public_key: &str,
        request: &SessionRequest,
    ) -> Result<SessionSigs, CustodyError> {
        let body = SessionKeyBody {
            auth_sig,
            pkp_public_key,
            request,
        };
        let value = self.post("/web/sign_session_key", &body).await?;
        let parsed: SessionKeyResponse =
            serde_json::from_value(value).map_err(|e| CustodyError::Malformed(e.to_string()))?;
        if parsed.session_sigs.is_empty() {
            return Err(CustodyError::Malformed(
                "no session signatures returned".into(),
            ));
        }
        Ok(parsed.session_sigs)
    }

    /// Sign a 32-byte digest with the PKP identified by `pkp_public_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no signature can be decoded.
    pub async fn pkp_sign(
        &self,
        pkp_public_key: &str,
        session: &SessionSigs,
        digest: &B256,
    ) -> Result<Signature, CustodyError> {
        let body = PkpSignBody {
            to_sign: digest.to_vec(),
            pubkey: pkp_public_key,
            session_sigs: session,
        };
        let value = self.post("/web/pkp/sign", &body).await?;
        signature_from_response(&value)
    }
}

/// Decode a signature from a `/web/pkp/sign` response.
///
/// Accepts either a 65-byte hex `signature` field or split `r`, `s`,
/// `recid` fields.
pub(super) fn signature_from_response(value: &Value) -> Result<Signature, CustodyError> {
    if let Some(sig) = value.get("signature").and_then(Value::as_str) {
        return parse_signature(sig);
    }

    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| CustodyError::Malformed(format!("missing '{name}' in sign response")))
    };
    let word = |name: &str| -> Result<U256, CustodyError> {
        let raw = field(name)?;
        let hex = raw.strip_prefix("0x").unwrap_or(raw);
        U256::from_str_radix(hex, 16)
            .map_err(|e| CustodyError::Malformed(format!("bad '{name}': {e}")))
    };

    let r = word("r")?;
    let s = word("s")?;
    let recid = value
        .get("recid")
        .and_then(Value::as_u64)
        .ok_or_else(|| CustodyError::Malformed("missing 'recid' in sign response".into()))?;
    let parity = match recid {
        0 | 27 => false,
        1 | 28 => true,
        other => {
            return Err(CustodyError::Malformed(format!("bad recid {other}")));
        }
    };
    Ok(Signature::new(r, s, parity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_from_hex_field() {
        let hex = format!("0x{}{}1b", "11".repeat(32), "22".repeat(32));
        let sig = signature_from_response(&json!({ "signature": hex })).unwrap();
        assert_eq!(sig.r(), U256::from_be_bytes([0x11; 32]));
        assert!(!sig.v());
    }

    #[test]
    fn test_signature_from_split_fields() {
        let value = json!({
            "r": format!("0x{}", "0a".repeat(32)),
            "s": "33".repeat(32),
            "recid": 1
        });
        let sig = signature_from_response(&value).unwrap();
        assert_eq!(sig.s(), U256::from_be_bytes([0x33; 32]));
        assert!(sig.v());
    }

    #[test]
    fn test_signature_errors() {
        assert!(signature_from_response(&json!({})).is_err());
        assert!(signature_from_response(&json!({"r": "0x01", "s": "0x02", "recid": 5})).is_err());
        assert!(signature_from_response(&json!({"signature": "0x1234"})).is_err());
    }

    #[test]
    fn test_session_body_shape() {
        let auth = AuthSig {
            sig: "0x00".into(),
            derived_via: "web3.eth.personal.sign".into(),
            signed_message: "msg".into(),
            address: "0xabc".into(),
        };
        let request = SessionRequest {
            chain: "ethereum".into(),
            expiration: "2024-01-01T00:00:00.000Z".into(),
            resource_ability_requests: vec![ResourceAbility::pkp_signing_any()],
        };
        let body = serde_json::to_value(SessionKeyBody {
            auth_sig: &auth,
            pkp_public_key: "0x04aa",
            request: &request,
        })
        .unwrap();
        assert_eq!(body["authSig"]["derivedVia"], "web3.eth.personal.sign");
        assert_eq!(body["pkpPublicKey"], "0x04aa");
        assert_eq!(body["chain"], "ethereum");
        assert_eq!(body["resourceAbilityRequests"][0]["resource"], "lit-pkp://*");
        assert_eq!(body["resourceAbilityRequests"][0]["ability"], "pkp-signing");
    }

    #[test]
    fn test_session_sigs_parse() {
        let parsed: SessionKeyResponse = serde_json::from_value(json!({
            "sessionSigs": {
                "https://node-1": {
                    "sig": "0x01",
                    "derivedVia": "litSessionSignViaNacl",
                    "signedMessage": "{}",
                    "address": "abcd"
                }
            }
        }))
        .unwrap();
        assert_eq!(parsed.session_sigs.len(), 1);
    }

    #[test]
    fn test_session_uri() {
        let client = CustodyClient::new(CustodyNetwork::DatilDev);
        assert_eq!(client.session_uri(), "lit:session:datil-dev");
    }
}
