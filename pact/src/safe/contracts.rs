//! Safe v1.4.1 ABI, deployment addresses and the pure encoding helpers.

use alloy::primitives::{Address, B256, Bytes, Signature, U256, address, keccak256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};

/// Contract bindings used by the Safe client.
#[allow(missing_docs)]
pub(crate) mod abi {
    use super::sol;

    sol! {
        interface ISafeProxyFactory {
            function createProxyWithNonce(address singleton, bytes initializer, uint256 saltNonce) external returns (address proxy);
            function proxyCreationCode() external pure returns (bytes);
        }

        interface ISafe {
            function setup(
                address[] owners,
                uint256 threshold,
                address to,
                bytes data,
                address fallbackHandler,
                address paymentToken,
                uint256 payment,
                address paymentReceiver
            ) external;

            function nonce() external view returns (uint256);

            function getTransactionHash(
                address to,
                uint256 value,
                bytes data,
                uint8 operation,
                uint256 safeTxGas,
                uint256 baseGas,
                uint256 gasPrice,
                address gasToken,
                address refundReceiver,
                uint256 nonce
            ) external view returns (bytes32);

            function execTransaction(
                address to,
                uint256 value,
                bytes data,
                uint8 operation,
                uint256 safeTxGas,
                uint256 baseGas,
                uint256 gasPrice,
                address gasToken,
                address refundReceiver,
                bytes signatures
            ) external payable returns (bool success);
        }
    }
}

/// Addresses of the Safe deployment in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeContracts {
    /// `SafeProxyFactory`.
    pub proxy_factory: Address,
    /// `SafeL2` singleton the proxies delegate to.
    pub singleton: Address,
    /// `CompatibilityFallbackHandler`.
    pub fallback_handler: Address,
}

impl SafeContracts {
    /// Canonical v1.4.1 deployment on Sepolia.
    pub const SEPOLIA_V1_4_1: Self = Self {
        proxy_factory: address!("4e1DCf7AD4e460CfD30791CCC4F9c8a4f820ec67"),
        singleton: address!("29fcB43b46531BcA003ddC8FCB67FFE91900C762"),
        fallback_handler: address!("fd0732Dc9E303f09fCEf3a7388Ad10A83459Ec99"),
    };
}

impl Default for SafeContracts {
    fn default() -> Self {
        Self::SEPOLIA_V1_4_1
    }
}

/// Safe operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Operation {
    /// Plain call.
    #[default]
    Call = 0,
    /// Delegate call.
    DelegateCall = 1,
}

/// A Safe transaction, gas refund fields left at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransaction {
    /// Target.
    pub to: Address,
    /// Wei sent along.
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
    /// Call or delegate call.
    pub operation: Operation,
    /// Safe nonce the transaction is bound to.
    pub nonce: U256,
}

impl SafeTransaction {
    /// A call to `to` with `value` and no data.
    #[must_use]
    pub fn transfer(to: Address, value: U256, nonce: U256) -> Self {
        Self {
            to,
            value,
            data: Bytes::new(),
            operation: Operation::Call,
            nonce,
        }
    }

    /// `getTransactionHash` calldata.
    #[must_use]
    pub fn hash_calldata(&self) -> Bytes {
        abi::ISafe::getTransactionHashCall {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: self.operation as u8,
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: Address::ZERO,
            refundReceiver: Address::ZERO,
            nonce: self.nonce,
        }
        .abi_encode()
        .into()
    }

    /// `execTransaction` calldata carrying `signatures`.
    #[must_use]
    pub fn exec_calldata(&self, signatures: Bytes) -> Bytes {
        abi::ISafe::execTransactionCall {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: self.operation as u8,
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: Address::ZERO,
            refundReceiver: Address::ZERO,
            signatures,
        }
        .abi_encode()
        .into()
    }
}

/// `setup` calldata for a fresh Safe.
#[must_use]
pub fn setup_calldata(contracts: &SafeContracts, owners: &[Address], threshold: u64) -> Bytes {
    abi::ISafe::setupCall {
        owners: owners.to_vec(),
        threshold: U256::from(threshold),
        to: Address::ZERO,
        data: Bytes::new(),
        fallbackHandler: contracts.fallback_handler,
        paymentToken: Address::ZERO,
        payment: U256::ZERO,
        paymentReceiver: Address::ZERO,
    }
    .abi_encode()
    .into()
}

/// `createProxyWithNonce` calldata.
#[must_use]
pub fn create_proxy_calldata(
    contracts: &SafeContracts,
    initializer: &Bytes,
    salt_nonce: U256,
) -> Bytes {
    abi::ISafeProxyFactory::createProxyWithNonceCall {
        singleton: contracts.singleton,
        initializer: initializer.clone(),
        saltNonce: salt_nonce,
    }
    .abi_encode()
    .into()
}

/// CREATE2 salt used by the proxy factory:
/// `keccak256(keccak256(initializer) ++ saltNonce)`.
#[must_use]
pub fn proxy_salt(initializer: &[u8], salt_nonce: U256) -> B256 {
    keccak256((keccak256(initializer), salt_nonce).abi_encode_packed())
}

/// Address the factory will deploy the proxy at.
///
/// `creation_code` is the factory's `proxyCreationCode()`; the singleton
/// address is appended as a 32-byte word to form the init code.
#[must_use]
pub fn predict_proxy_address(
    contracts: &SafeContracts,
    creation_code: &[u8],
    initializer: &[u8],
    salt_nonce: U256,
) -> Address {
    let mut init_code = creation_code.to_vec();
    init_code.extend_from_slice(&contracts.singleton.into_word().0);
    contracts
        .proxy_factory
        .create2(proxy_salt(initializer, salt_nonce), keccak256(&init_code))
}

/// Pack an owner signature over a Safe transaction hash as `r || s || v`
/// with `v` in 27/28.
#[must_use]
pub fn pack_signature(sig: &Signature) -> Bytes {
    Bytes::copy_from_slice(&sig.as_bytes())
}

/// Random 10-digit salt nonce.
#[must_use]
pub fn random_salt_nonce() -> u64 {
    fastrand::u64(1_000_000_000..10_000_000_000)
}
