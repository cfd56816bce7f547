//! Sign-In with Ethereum (EIP-4361) messages carrying ReCap (EIP-5573)
//! capability resources, and the auth signature the custody network expects.

use std::fmt::{self, Write as _};

use alloy::primitives::Address;
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::CustodyError;

/// A capability the session asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ability {
    /// Sign with a PKP.
    PkpSigning,
}

impl Ability {
    /// ReCap namespace and ability name.
    #[must_use]
    pub const fn recap(self) -> (&'static str, &'static str) {
        match self {
            Self::PkpSigning => ("Threshold", "Signing"),
        }
    }
}

/// A resource/ability pair requested for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAbility {
    /// Resource URI, e.g. `lit-pkp://*`.
    pub resource: String,
    /// Requested ability on the resource.
    pub ability: Ability,
}

impl ResourceAbility {
    /// PKP signing on every PKP the controller owns.
    #[must_use]
    pub fn pkp_signing_any() -> Self {
        Self {
            resource: "lit-pkp://*".into(),
            ability: Ability::PkpSigning,
        }
    }
}

/// Encode resource abilities as a single `urn:recap:` URI.
#[must_use]
pub fn recap_uri(requests: &[ResourceAbility]) -> String {
    let mut att = serde_json::Map::new();
    for req in requests {
        let (namespace, name) = req.ability.recap();
        let entry = att
            .entry(req.resource.clone())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let Some(obj) = entry.as_object_mut() {
            obj.insert(
                format!("{namespace}/{name}"),
                serde_json::json!([{}]),
            );
        }
    }
    let payload = serde_json::json!({ "att": att, "prf": [] });
    format!("urn:recap:{}", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

/// Human-readable ReCap statement appended to the SIWE statement.
#[must_use]
pub fn recap_statement(requests: &[ResourceAbility]) -> String {
    let mut out = String::from(
        "I further authorize the stated URI to perform the following actions on my behalf:",
    );
    for (i, req) in requests.iter().enumerate() {
        let (namespace, name) = req.ability.recap();
        let _ = write!(
            out,
            " ({}) '{namespace}': '{name}' for '{}'.",
            i + 1,
            req.resource
        );
    }
    out
}

/// Generate a nonce of the form `{unix_millis}{13 base36 chars}`.
#[must_use]
pub fn generate_nonce() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let millis = Utc::now().timestamp_millis();
    let suffix: String = (0..13)
        .map(|_| char::from(ALPHABET[fastrand::usize(..ALPHABET.len())]))
        .collect();
    format!("{millis}{suffix}")
}

/// An EIP-4361 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    /// Requesting domain.
    pub domain: String,
    /// Signing account.
    pub address: Address,
    /// Statement shown to the signer.
    pub statement: Option<String>,
    /// Subject URI.
    pub uri: String,
    /// Chain id the session is scoped to.
    pub chain_id: u64,
    /// Replay-protection nonce.
    pub nonce: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiration time.
    pub expiration_time: Option<DateTime<Utc>>,
    /// Resource URIs.
    pub resources: Vec<String>,
}

impl SiweMessage {
    /// Build the session-authorization message for `requests`.
    #[must_use]
    pub fn for_session(
        address: Address,
        uri: impl Into<String>,
        nonce: impl Into<String>,
        expiration: DateTime<Utc>,
        requests: &[ResourceAbility],
    ) -> Self {
        Self {
            domain: "localhost".into(),
            address,
            statement: Some(recap_statement(requests)),
            uri: uri.into(),
            chain_id: 1,
            nonce: nonce.into(),
            issued_at: Utc::now(),
            expiration_time: Some(expiration),
            resources: vec![recap_uri(requests)],
        }
    }
}

fn iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} wants you to sign in with your Ethereum account:",
            self.domain
        )?;
        writeln!(f, "{}", self.address.to_checksum(None))?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
            writeln!(f)?;
        }
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: 1")?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        write!(f, "Issued At: {}", iso(&self.issued_at))?;
        if let Some(exp) = &self.expiration_time {
            write!(f, "\nExpiration Time: {}", iso(exp))?;
        }
        if !self.resources.is_empty() {
            write!(f, "\nResources:")?;
            for r in &self.resources {
                write!(f, "\n- {r}")?;
            }
        }
        Ok(())
    }
}

/// A wallet signature over a SIWE message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    /// 0x-prefixed 65-byte signature.
    pub sig: String,
    /// How the signature was produced.
    pub derived_via: String,
    /// The exact signed text.
    pub signed_message: String,
    /// Signer address.
    pub address: String,
}

impl AuthSig {
    /// Sign `message` with EIP-191 `personal_sign`.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::Signing`] if the signer fails.
    pub async fn sign(
        signer: &PrivateKeySigner,
        message: &SiweMessage,
    ) -> Result<Self, CustodyError> {
        let text = message.to_string();
        let sig = signer
            .sign_message(text.as_bytes())
            .await
            .map_err(|e| CustodyError::Signing(format!("auth signature failed: {e}")))?;
        Ok(Self {
            sig: format!("0x{}", alloy::primitives::hex::encode(sig.as_bytes())),
            derived_via: "web3.eth.personal.sign".into(),
            signed_message: text,
            address: signer.address().to_checksum(None),
        })
    }

    /// Recover the address that produced this signature.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::Signing`] if the signature is malformed.
    pub fn recover(&self) -> Result<Address, CustodyError> {
        let sig = super::parse_signature(&self.sig)?;
        sig.recover_address_from_msg(self.signed_message.as_bytes())
            .map_err(|e| CustodyError::Signing(format!("recovery failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_message() -> SiweMessage {
        let address: Address = "0x000000000000000000000000000000000000dEaD".parse().unwrap();
        let issued = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut msg = SiweMessage::for_session(
            address,
            "lit:session:abc",
            "n0nce",
            issued + chrono::Duration::hours(1),
            &[ResourceAbility::pkp_signing_any()],
        );
        msg.issued_at = issued;
        msg
    }

    #[test]
    fn test_message_layout() {
        let text = fixed_message().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "localhost wants you to sign in with your Ethereum account:");
        assert_eq!(lines[1], "0x000000000000000000000000000000000000dEaD");
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with("I further authorize"));
        assert!(lines[3].ends_with("(1) 'Threshold': 'Signing' for 'lit-pkp://*'."));
        assert!(text.contains("\nURI: lit:session:abc\nVersion: 1\nChain ID: 1\nNonce: n0nce\n"));
        assert!(text.contains("Issued At: 2024-01-02T03:04:05.000Z"));
        assert!(text.contains("Expiration Time: 2024-01-02T04:04:05.000Z"));
        assert!(text.contains("Resources:\n- urn:recap:"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_recap_roundtrips_through_base64() {
        let uri = recap_uri(&[ResourceAbility::pkp_signing_any()]);
        let encoded = uri.strip_prefix("urn:recap:").unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(encoded).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(json["att"]["lit-pkp://*"]["Threshold/Signing"], serde_json::json!([{}]));
        assert_eq!(json["prf"], serde_json::json!([]));
    }

    #[test]
    fn test_nonce_shape() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert!(a.len() >= 13 + 13);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_auth_sig_recovers_signer() {
        let signer = PrivateKeySigner::random();
        let mut msg = fixed_message();
        msg.address = signer.address();

        let auth = AuthSig::sign(&signer, &msg).await.unwrap();
        assert_eq!(auth.derived_via, "web3.eth.personal.sign");
        assert_eq!(auth.sig.len(), 2 + 130);
        assert_eq!(auth.recover().unwrap(), signer.address());

        let json = serde_json::to_value(&auth).unwrap();
        assert!(json.get("signedMessage").is_some());
        assert!(json.get("derivedVia").is_some());
    }
}
