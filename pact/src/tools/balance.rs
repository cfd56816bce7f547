//! Sepolia balance and ETH price tools.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use super::ToolContext;
use super::distribution::round_cents;
use crate::chain;
use crate::error::ToolError;
use crate::price::PriceClient;
use crate::tool::Tool;

/// Sentence returned by `getEthBalance`.
#[must_use]
pub fn balance_message(address: &str, eth: &str) -> String {
    format!(
        "The current balance of the Sepolia wallet at address {address} is {eth} ETH.\n\
         Use this information and tell the user the amount of ETH they have in the wallet \
         and how much it is worth in USD."
    )
}

/// Sentence returned by `getEthPriceUsd`.
#[must_use]
pub fn price_message(price: f64) -> String {
    format!("The current price of ETH is ${:.2} USD.", round_cents(price))
}

/// Arguments of [`EthBalanceTool`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BalanceArgs {
    /// 0x-prefixed Sepolia address.
    pub address: String,
}

/// `getEthBalance`.
#[derive(Debug, Clone)]
pub struct EthBalanceTool {
    ctx: ToolContext,
}

impl EthBalanceTool {
    /// Create the tool.
    #[must_use]
    pub const fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for EthBalanceTool {
    const NAME: &'static str = "getEthBalance";
    type Args = BalanceArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Call to Get the balance in ETH of a given Sepolia address.".to_owned()
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let address = chain::parse_address(&args.address)?;
        let provider = chain::connect(self.ctx.rpc_url()?).await?;
        let wei = chain::balance_of(&provider, address).await?;
        let eth = chain::format_eth(wei);
        debug!(%address, %eth, "balance fetched");
        Ok(balance_message(args.address.trim(), &eth))
    }
}

/// Arguments of [`EthPriceTool`] (none).
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// `getEthPriceUsd`.
#[derive(Debug, Clone, Default)]
pub struct EthPriceTool {
    client: PriceClient,
}

impl EthPriceTool {
    /// Create the tool around `client`.
    #[must_use]
    pub const fn new(client: PriceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for EthPriceTool {
    const NAME: &'static str = "getEthPriceUsd";
    type Args = NoArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Get the current price of ETH in USD.".to_owned()
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        let price = self.client.eth_usd().await?;
        Ok(price_message(price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::DynTool;
    use serde_json::json;

    #[test]
    fn test_messages() {
        let msg = balance_message("0xabc", "1.5");
        assert!(msg.starts_with(
            "The current balance of the Sepolia wallet at address 0xabc is 1.5 ETH."
        ));
        assert!(msg.contains("worth in USD"));
        assert_eq!(price_message(3120.456), "The current price of ETH is $3120.46 USD.");
        assert_eq!(price_message(2500.125), "The current price of ETH is $2500.13 USD.");
    }

    #[tokio::test]
    async fn test_balance_rejects_bad_address_before_rpc() {
        // No RPC configured: an invalid address must still fail on validation.
        let tool = EthBalanceTool::new(ToolContext::offline());
        let err = tool.call_json(json!({"address": "0x1234"})).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid arguments: Invalid address.");
    }

    #[tokio::test]
    async fn test_balance_without_rpc() {
        let tool = EthBalanceTool::new(ToolContext::offline());
        let err = tool
            .call_json(json!({"address": "0x000000000000000000000000000000000000dEaD"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("INFURA_API_KEY"));
    }

    #[test]
    fn test_price_tool_takes_no_args() {
        let def = EthPriceTool::default().definition();
        assert_eq!(def.name, "getEthPriceUsd");
        assert_eq!(def.parameters["properties"], json!({}));
    }
}
