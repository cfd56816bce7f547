//! JSON-RPC wiring and small EVM helpers shared by the tools.

use alloy::network::Ethereum;
use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use tracing::debug;

/// Sepolia chain id.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Errors from RPC access and address handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ChainError {
    /// The input is not a 0x-prefixed, 20-byte hex address.
    #[error("Invalid address.")]
    InvalidAddress(String),

    /// The RPC endpoint failed or returned garbage.
    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Infura Sepolia endpoint for an API key.
#[must_use]
pub fn infura_sepolia_url(api_key: &str) -> String {
    format!("https://sepolia.infura.io/v3/{api_key}")
}

/// Validate and parse a user-supplied address.
///
/// The string must start with `0x`, be exactly 42 characters long and
/// contain valid hex. Mixed-case input is not checksum-verified.
///
/// # Errors
///
/// Returns [`ChainError::InvalidAddress`] on any violation.
pub fn parse_address(input: &str) -> Result<Address, ChainError> {
    let input = input.trim();
    if !input.starts_with("0x") || input.len() != 42 {
        return Err(ChainError::InvalidAddress(input.to_string()));
    }
    input
        .parse::<Address>()
        .map_err(|_| ChainError::InvalidAddress(input.to_string()))
}

/// Format a wei amount as ether without trailing zeros (`1.5`, `0.0`).
#[must_use]
pub fn format_eth(wei: U256) -> String {
    let full = format_ether(wei);
    match full.split_once('.') {
        Some((int, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{int}.0")
            } else {
                format!("{int}.{frac}")
            }
        }
        None => format!("{full}.0"),
    }
}

/// Parse a decimal ether amount (e.g. `"0.01"`) into wei.
///
/// # Errors
///
/// Returns a message naming the bad input. Signs are rejected: the amount
/// must be plain digits with an optional fractional part.
pub fn parse_eth(amount: &str) -> Result<U256, String> {
    let trimmed = amount.trim();
    let well_formed = trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
        && trimmed.matches('.').count() <= 1;
    if !well_formed {
        return Err(format!("invalid ETH amount '{amount}'"));
    }
    parse_ether(trimmed).map_err(|e| format!("invalid ETH amount '{amount}': {e}"))
}

/// Connect a read-only provider to `rpc_url`.
///
/// # Errors
///
/// Returns [`ChainError::Rpc`] if the URL cannot be connected.
pub async fn connect(rpc_url: &str) -> Result<DynProvider<Ethereum>, ChainError> {
    debug!(rpc_url, "connecting provider");
    let provider = ProviderBuilder::new()
        .connect(rpc_url)
        .await
        .map_err(|e| ChainError::Rpc(format!("failed to connect to '{rpc_url}': {e}")))?;
    Ok(provider.erased())
}

/// Native balance of `address` in wei.
///
/// # Errors
///
/// Returns [`ChainError::Rpc`] if the call fails.
pub async fn balance_of(
    provider: &DynProvider<Ethereum>,
    address: Address,
) -> Result<U256, ChainError> {
    provider
        .get_balance(address)
        .await
        .map_err(|e| ChainError::Rpc(format!("failed to get balance: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_rules() {
        let ok = "0x000000000000000000000000000000000000dEaD";
        assert!(parse_address(ok).is_ok());
        assert!(parse_address(&format!(" {ok} ")).is_ok());

        // Missing prefix, wrong length, bad hex.
        assert!(parse_address("000000000000000000000000000000000000dEaD00").is_err());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xZZ0000000000000000000000000000000000dEaD").is_err());

        let err = parse_address("nope").unwrap_err();
        assert_eq!(err.to_string(), "Invalid address.");
    }

    #[test]
    fn test_format_eth_trims() {
        assert_eq!(format_eth(U256::ZERO), "0.0");
        assert_eq!(format_eth(U256::from(10u64).pow(U256::from(18u64))), "1.0");
        assert_eq!(format_eth(U256::from(1_500_000_000_000_000_000u128)), "1.5");
        assert_eq!(format_eth(U256::from(1u64)), "0.000000000000000001");
    }

    #[test]
    fn test_parse_eth() {
        assert_eq!(parse_eth("0.5").unwrap(), U256::from(500_000_000_000_000_000u128));
        assert_eq!(parse_eth(" 2 ").unwrap(), U256::from(2_000_000_000_000_000_000u128));
        assert!(parse_eth("lots").is_err());
        assert!(parse_eth("-0.5").is_err());
        assert!(parse_eth("-").is_err());
        assert!(parse_eth("").is_err());
        assert!(parse_eth("1.2.3").is_err());
    }

    #[test]
    fn test_infura_url() {
        assert_eq!(infura_sepolia_url("k"), "https://sepolia.infura.io/v3/k");
    }
}
