//! The agent's tools.
//!
//! | name | what |
//! |---|---|
//! | `calculateUSDCdistribution` | reward per successful participant |
//! | `sendTnx` | execute a transaction through a Safe |
//! | `getEthBalance` | Sepolia balance of an address |
//! | `getEthPriceUsd` | ETH price in USD |
//! | `multiply` | product of two numbers |
//! | `deployNewSafe` | deploy a Safe owned by the signer |
//! | `getPendingTransactions` | unexecuted multisig transactions of a Safe |
//!
//! Tools that touch the chain share a [`ToolContext`].

mod balance;
mod distribution;
mod safe;

use std::sync::Arc;

pub use balance::{
    BalanceArgs, EthBalanceTool, EthPriceTool, NoArgs, balance_message, price_message,
};
pub use distribution::{
    DistributionArgs, MultiplyArgs, MultiplyTool, UsdcDistributionTool,
    calculate_usdc_distribution,
};
pub use safe::{
    DeploySafeTool, EthAmount, PendingArgs, PendingTransactionsTool, SendSafeTxTool, SendTxArgs,
    deployment_message, execution_message, pending_message,
};

use crate::config::{ConfigError, Settings};
use crate::custody::SignerCell;
use crate::error::ToolError;
use crate::price::PriceClient;
use crate::safe::{SafeClient, SafeContracts, TxServiceClient};
use crate::tool::BoxedTool;

/// Names of every tool returned by [`all`], in registration order.
pub const TOOL_NAMES: &[&str] = &[
    "calculateUSDCdistribution",
    "sendTnx",
    "getEthBalance",
    "getEthPriceUsd",
    "multiply",
    "deployNewSafe",
    "getPendingTransactions",
];

/// Shared dependencies of the chain-facing tools.
#[derive(Debug, Clone)]
pub struct ToolContext {
    rpc_url: Option<String>,
    signer: Arc<SignerCell>,
    contracts: SafeContracts,
    price: PriceClient,
    tx_service: TxServiceClient,
}

impl ToolContext {
    /// Context with default endpoints and no RPC URL.
    #[must_use]
    pub fn new(signer: Arc<SignerCell>) -> Self {
        Self {
            rpc_url: None,
            signer,
            contracts: SafeContracts::default(),
            price: PriceClient::default(),
            tx_service: TxServiceClient::default(),
        }
    }

    /// Context configured from `settings`.
    #[must_use]
    pub fn from_settings(settings: &Settings, signer: Arc<SignerCell>) -> Self {
        Self {
            rpc_url: settings.rpc_url.clone(),
            signer,
            contracts: settings.safe_contracts,
            price: PriceClient::new(&settings.coingecko_url),
            tx_service: TxServiceClient::new(&settings.tx_service_url),
        }
    }

    /// Set the RPC URL.
    #[must_use]
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// The signer cell.
    #[must_use]
    pub const fn signer(&self) -> &Arc<SignerCell> {
        &self.signer
    }

    /// Price API client.
    #[must_use]
    pub const fn price(&self) -> &PriceClient {
        &self.price
    }

    /// Transaction service client.
    #[must_use]
    pub const fn tx_service(&self) -> &TxServiceClient {
        &self.tx_service
    }

    /// The configured RPC URL.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Execution`] when none is configured.
    pub fn rpc_url(&self) -> Result<&str, ToolError> {
        self.rpc_url
            .as_deref()
            .ok_or_else(|| {
                ToolError::execution(
                    ConfigError::Missing("SEPOLIA_RPC_URL or INFURA_API_KEY").to_string(),
                )
            })
    }

    /// A Safe client signing with the (lazily initialized) signer.
    ///
    /// # Errors
    ///
    /// Fails without an RPC URL, when the signer cannot be initialized, or
    /// when the RPC endpoint cannot be connected.
    pub async fn safe_client(&self) -> Result<SafeClient, ToolError> {
        let rpc_url = self.rpc_url()?;
        let signer = self.signer.get().await?;
        Ok(SafeClient::connect(rpc_url, signer, self.contracts).await?)
    }

    /// A context with no RPC and a signer that never initializes.
    #[cfg(test)]
    pub(crate) fn offline() -> Self {
        Self::new(Arc::new(SignerCell::with_initializer(|| async {
            Err(crate::custody::CustodyError::InvalidKey)
        })))
    }
}

/// Every tool, in registration order.
#[must_use]
pub fn all(ctx: &ToolContext) -> Vec<BoxedTool> {
    vec![
        Box::new(UsdcDistributionTool),
        Box::new(SendSafeTxTool::new(ctx.clone())),
        Box::new(EthBalanceTool::new(ctx.clone())),
        Box::new(EthPriceTool::new(ctx.price().clone())),
        Box::new(MultiplyTool),
        Box::new(DeploySafeTool::new(ctx.clone())),
        Box::new(PendingTransactionsTool::new(ctx.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{DynTool, Tool};

    #[test]
    fn test_all_names_in_order() {
        let tools = all(&ToolContext::offline());
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, TOOL_NAMES);
    }

    #[test]
    fn test_definitions_are_objects() {
        for tool in all(&ToolContext::offline()) {
            let def = tool.definition();
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(def.parameters["properties"].is_object(), "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[tokio::test]
    async fn test_deploy_reports_missing_rpc() {
        let tools = all(&ToolContext::offline());
        let deploy = tools.iter().find(|t| t.name() == "deployNewSafe").unwrap();
        let err = deploy.call_json(serde_json::Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("SEPOLIA_RPC_URL"));
    }

    #[tokio::test]
    async fn test_deploy_reports_signer_failure() {
        let ctx = ToolContext::offline().with_rpc_url("http://127.0.0.1:9");
        let err = DeploySafeTool::new(ctx).call(NoArgs {}).await.unwrap_err();
        assert!(err.to_string().contains("invalid controller private key"));
    }
}
