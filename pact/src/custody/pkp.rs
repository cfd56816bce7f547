//! Signer handles: a remote PKP signer and the local-key fallback.

use std::sync::Arc;

use alloy::consensus::SignableTransaction;
use alloy::network::TxSigner;
use alloy::primitives::{Address, B256, ChainId, Signature, hex};
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use super::CustodyError;
use super::client::{CustodyClient, SessionSigs};

/// Derive the Ethereum address of an uncompressed secp256k1 public key.
///
/// Accepts `0x04`-prefixed 65-byte keys or bare 64-byte keys, hex encoded
/// with or without `0x`.
///
/// # Errors
///
/// Returns [`CustodyError::InvalidPublicKey`] for anything else.
pub fn address_from_public_key(public_key: &str) -> Result<Address, CustodyError> {
    let bytes = hex::decode(public_key.trim())
        .map_err(|e| CustodyError::InvalidPublicKey(format!("not hex: {e}")))?;
    let raw = match bytes.as_slice() {
        [0x04, rest @ ..] if rest.len() == 64 => rest,
        body if body.len() == 64 => body,
        other => {
            return Err(CustodyError::InvalidPublicKey(format!(
                "expected 64 or 65 (0x04-prefixed) bytes, got {}",
                other.len()
            )));
        }
    };
    Ok(Address::from_raw_public_key(raw))
}

/// A signer backed by a PKP held on the custody network.
///
/// Every signature is a round trip to the network, authorized by the session
/// signatures obtained during initialization.
#[derive(Clone)]
pub struct PkpSigner {
    client: CustodyClient,
    public_key: String,
    address: Address,
    session: Arc<SessionSigs>,
    chain_id: Option<ChainId>,
}

impl std::fmt::Debug for PkpSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkpSigner")
            .field("address", &self.address)
            .field("network", self.client.network())
            .field("session_nodes", &self.session.len())
            .finish_non_exhaustive()
    }
}

impl PkpSigner {
    /// Create a PKP signer.
    ///
    /// # Errors
    ///
    /// Returns an error if `public_key` is not a valid uncompressed key.
    pub fn new(
        client: CustodyClient,
        public_key: impl Into<String>,
        session: SessionSigs,
    ) -> Result<Self, CustodyError> {
        let public_key = public_key.into();
        let address = address_from_public_key(&public_key)?;
        Ok(Self {
            client,
            public_key,
            address,
            session: Arc::new(session),
            chain_id: None,
        })
    }

    /// PKP address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// PKP public key as configured.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

#[async_trait]
impl Signer for PkpSigner {
    async fn sign_hash(&self, hash: &B256) -> alloy::signers::Result<Signature> {
        self.client
            .pkp_sign(&self.public_key, &self.session, hash)
            .await
            .map_err(alloy::signers::Error::other)
    }

    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> Option<ChainId> {
        self.chain_id
    }

    fn set_chain_id(&mut self, chain_id: Option<ChainId>) {
        self.chain_id = chain_id;
    }
}

#[async_trait]
impl TxSigner<Signature> for PkpSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(
        &self,
        tx: &mut dyn SignableTransaction<Signature>,
    ) -> alloy::signers::Result<Signature> {
        let hash = tx.signature_hash();
        Signer::sign_hash(self, &hash).await
    }
}

/// The signer the agent acts with.
///
/// `Pkp` is the normal mode. `Local` signs with the controller key itself and
/// is used when no PKP public key is configured.
#[derive(Debug, Clone)]
pub enum SignerHandle {
    /// Controller key held in process.
    Local(PrivateKeySigner),
    /// Remote PKP.
    Pkp(PkpSigner),
}

impl SignerHandle {
    /// Signer address.
    #[must_use]
    pub fn address(&self) -> Address {
        match self {
            Self::Local(s) => s.address(),
            Self::Pkp(s) => s.address(),
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Pkp(_) => "pkp",
        }
    }
}

#[async_trait]
impl Signer for SignerHandle {
    async fn sign_hash(&self, hash: &B256) -> alloy::signers::Result<Signature> {
        match self {
            Self::Local(s) => Signer::sign_hash(s, hash).await,
            Self::Pkp(s) => Signer::sign_hash(s, hash).await,
        }
    }

    fn address(&self) -> Address {
        Self::address(self)
    }

    fn chain_id(&self) -> Option<ChainId> {
        match self {
            Self::Local(s) => Signer::chain_id(s),
            Self::Pkp(s) => Signer::chain_id(s),
        }
    }

    fn set_chain_id(&mut self, chain_id: Option<ChainId>) {
        match self {
            Self::Local(s) => Signer::set_chain_id(s, chain_id),
            Self::Pkp(s) => Signer::set_chain_id(s, chain_id),
        }
    }
}

#[async_trait]
impl TxSigner<Signature> for SignerHandle {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_transaction(
        &self,
        tx: &mut dyn SignableTransaction<Signature>,
    ) -> alloy::signers::Result<Signature> {
        match self {
            Self::Local(s) => TxSigner::sign_transaction(s, tx).await,
            Self::Pkp(s) => TxSigner::sign_transaction(s, tx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Public key of the secp256k1 private key `1`.
    const KEY_ONE_PUB: &str = "0x0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    #[test]
    fn test_address_from_public_key() {
        let expected: Address = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse().unwrap();
        assert_eq!(address_from_public_key(KEY_ONE_PUB).unwrap(), expected);
        // Bare 64-byte body.
        let bare = format!("0x{}", &KEY_ONE_PUB[4..]);
        assert_eq!(address_from_public_key(&bare).unwrap(), expected);
    }

    #[test]
    fn test_address_from_public_key_rejects() {
        assert!(address_from_public_key("0xzz").is_err());
        assert!(address_from_public_key("0x04abcd").is_err());
        // Compressed keys are not accepted.
        let compressed = "0x0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        assert!(address_from_public_key(compressed).is_err());
    }

    #[test]
    fn test_pkp_signer_debug_hides_session() {
        let client = CustodyClient::new(super::super::CustodyNetwork::DatilDev);
        let signer = PkpSigner::new(client, KEY_ONE_PUB, SessionSigs(Default::default())).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("PkpSigner"));
        assert!(!debug.contains("session_sigs"));
        assert_eq!(signer.public_key(), KEY_ONE_PUB);
    }

    #[tokio::test]
    async fn test_local_handle_signs() {
        let key = PrivateKeySigner::random();
        let handle = SignerHandle::Local(key.clone());
        assert_eq!(handle.address(), key.address());
        assert_eq!(handle.kind(), "local");

        let hash = B256::repeat_byte(7);
        let sig = Signer::sign_hash(&handle, &hash).await.unwrap();
        assert_eq!(sig.recover_address_from_prehash(&hash).unwrap(), key.address());
    }
}
