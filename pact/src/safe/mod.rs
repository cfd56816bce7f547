//! Safe multisig operations.
//!
//! [`SafeClient`] deploys single-owner Safes through the proxy factory and
//! executes transactions on them, signing with the agent's
//! [`SignerHandle`]. [`TxServiceClient`] reads pending multisig transactions
//! from the Safe transaction service.

mod contracts;
mod service;

use std::sync::Arc;

use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::Signer;
use alloy::sol_types::SolCall;
use tracing::{debug, info, instrument};

pub use contracts::{
    Operation, SafeContracts, SafeTransaction, create_proxy_calldata, pack_signature,
    predict_proxy_address, proxy_salt, random_salt_nonce, setup_calldata,
};
pub use service::{PendingTransaction, SEPOLIA_TX_SERVICE_URL, TxServiceClient, parse_pending};

use crate::custody::SignerHandle;
use contracts::abi;

/// Errors from Safe operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SafeError {
    /// RPC connection or read failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Sending or confirming a transaction failed.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// The transaction was mined but reverted.
    #[error("transaction {0} reverted")]
    Reverted(B256),

    /// The signer could not sign the Safe transaction hash.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A contract returned data that does not decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// Transaction service failure.
    #[error("transaction service: {0}")]
    Service(String),
}

/// Result of a Safe deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Address of the new Safe.
    pub safe_address: Address,
    /// Salt nonce passed to the factory.
    pub salt_nonce: u64,
    /// Deployment transaction hash.
    pub tx_hash: B256,
}

/// Result of an executed Safe transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Ethereum transaction hash.
    pub tx_hash: B256,
    /// Safe transaction hash that was signed.
    pub safe_tx_hash: B256,
    /// Safe nonce consumed.
    pub nonce: U256,
}

/// Safe web-app URL for a Sepolia Safe.
#[must_use]
pub fn safe_app_url(safe: Address) -> String {
    format!("https://app.safe.global/home?safe=sep:{}", safe.to_checksum(None))
}

/// Reads and writes Safes through a signing provider.
#[derive(Clone)]
pub struct SafeClient {
    provider: DynProvider<Ethereum>,
    signer: Arc<SignerHandle>,
    contracts: SafeContracts,
}

impl std::fmt::Debug for SafeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeClient")
            .field("signer", &self.signer.address())
            .field("contracts", &self.contracts)
            .finish_non_exhaustive()
    }
}

impl SafeClient {
    /// Connect a provider to `rpc_url` that signs with `signer`.
    ///
    /// # Errors
    ///
    /// Returns [`SafeError::Rpc`] if the endpoint cannot be connected.
    pub async fn connect(
        rpc_url: &str,
        signer: Arc<SignerHandle>,
        contracts: SafeContracts,
    ) -> Result<Self, SafeError> {
        let wallet = EthereumWallet::new(signer.as_ref().clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(rpc_url)
            .await
            .map_err(|e| SafeError::Rpc(format!("failed to connect to '{rpc_url}': {e}")))?
            .erased();
        Ok(Self {
            provider,
            signer,
            contracts,
        })
    }

    /// Address transactions are signed by.
    #[must_use]
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Contract addresses in use.
    #[must_use]
    pub const fn contracts(&self) -> &SafeContracts {
        &self.contracts
    }

    async fn read(&self, to: Address, data: Bytes) -> Result<Bytes, SafeError> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider
            .call(tx)
            .await
            .map_err(|e| SafeError::Rpc(format!("eth_call to {to} failed: {e}")))
    }

    async fn send(&self, to: Address, data: Bytes) -> Result<B256, SafeError> {
        let tx = TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(to)
            .with_input(data);
        let receipt = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| SafeError::Transaction(format!("send failed: {e}")))?
            .get_receipt()
            .await
            .map_err(|e| SafeError::Transaction(format!("receipt failed: {e}")))?;
        let hash = receipt.transaction_hash;
        if !ReceiptResponse::status(&receipt) {
            return Err(SafeError::Reverted(hash));
        }
        Ok(hash)
    }

    /// Deploy a Safe owned by the signer with threshold 1.
    ///
    /// # Errors
    ///
    /// Fails if the factory cannot be read or the deployment transaction
    /// fails.
    #[instrument(skip(self), fields(owner = %self.signer.address()))]
    pub async fn deploy(&self) -> Result<Deployment, SafeError> {
        let owner = self.signer.address();
        let salt_nonce = random_salt_nonce();
        let initializer = setup_calldata(&self.contracts, &[owner], 1);

        let raw = self
            .read(
                self.contracts.proxy_factory,
                abi::ISafeProxyFactory::proxyCreationCodeCall {}.abi_encode().into(),
            )
            .await?;
        let creation_code = abi::ISafeProxyFactory::proxyCreationCodeCall::abi_decode_returns(&raw)
            .map_err(|e| SafeError::Decode(format!("proxyCreationCode: {e}")))?;
        let safe_address = predict_proxy_address(
            &self.contracts,
            &creation_code,
            &initializer,
            U256::from(salt_nonce),
        );
        debug!(%safe_address, salt_nonce, "predicted Safe address");

        let calldata =
            create_proxy_calldata(&self.contracts, &initializer, U256::from(salt_nonce));
        let tx_hash = self.send(self.contracts.proxy_factory, calldata).await?;
        info!(%safe_address, %tx_hash, "Safe deployed");

        Ok(Deployment {
            safe_address,
            salt_nonce,
            tx_hash,
        })
    }

    /// Current nonce of `safe`.
    ///
    /// # Errors
    ///
    /// Fails if the call fails or `safe` is not a Safe.
    pub async fn nonce(&self, safe: Address) -> Result<U256, SafeError> {
        let raw = self
            .read(safe, abi::ISafe::nonceCall {}.abi_encode().into())
            .await?;
        abi::ISafe::nonceCall::abi_decode_returns(&raw)
            .map_err(|e| SafeError::Decode(format!("nonce: {e}")))
    }

    /// Execute `to`/`value` through `safe` with the signer's single signature.
    ///
    /// The Safe transaction hash is read from the contract so it always
    /// matches the deployed version's EIP-712 domain.
    ///
    /// # Errors
    ///
    /// Fails on RPC, signing or execution errors.
    #[instrument(skip(self), fields(safe = %safe))]
    pub async fn execute(
        &self,
        safe: Address,
        to: Address,
        value: U256,
    ) -> Result<Execution, SafeError> {
        let nonce = self.nonce(safe).await?;
        let tx = SafeTransaction::transfer(to, value, nonce);

        let raw = self.read(safe, tx.hash_calldata()).await?;
        let safe_tx_hash = abi::ISafe::getTransactionHashCall::abi_decode_returns(&raw)
            .map_err(|e| SafeError::Decode(format!("getTransactionHash: {e}")))?;
        debug!(%safe_tx_hash, %nonce, "signing Safe transaction");

        let signature = Signer::sign_hash(self.signer.as_ref(), &safe_tx_hash)
            .await
            .map_err(|e| SafeError::Signing(e.to_string()))?;
        let tx_hash = self
            .send(safe, tx.exec_calldata(pack_signature(&signature)))
            .await?;
        info!(%tx_hash, %safe_tx_hash, "Safe transaction executed");

        Ok(Execution {
            tx_hash,
            safe_tx_hash,
            nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_app_url() {
        let safe: Address = "0x000000000000000000000000000000000000dead".parse().unwrap();
        assert_eq!(
            safe_app_url(safe),
            "https://app.safe.global/home?safe=sep:0x000000000000000000000000000000000000dEaD"
        );
    }

    #[test]
    fn test_error_display() {
        let err = SafeError::Reverted(B256::ZERO);
        assert!(err.to_string().ends_with("reverted"));
        assert_eq!(SafeError::Rpc("down".into()).to_string(), "RPC error: down");
    }
}
