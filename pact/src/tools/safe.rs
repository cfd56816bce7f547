//! Safe tools: deploy, execute, list pending.

use std::fmt::Write as _;

use alloy::primitives::U256;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::ToolContext;
use super::balance::NoArgs;
use crate::chain;
use crate::error::ToolError;
use crate::safe::{Deployment, Execution, PendingTransaction, safe_app_url};
use crate::tool::Tool;

/// Sentence returned after a deployment.
#[must_use]
pub fn deployment_message(deployment: &Deployment) -> String {
    let address = deployment.safe_address.to_checksum(None);
    format!(
        "A new Safe multisig was successfully deployed on Sepolia at {address}. \
         You can see it live at {url}. The saltNonce used was {salt}.\n\
         Now tell the user that you have created this Safe and give them the details above in \
         a good format. Make sure the first address in your response is the Safe address.",
        url = safe_app_url(deployment.safe_address),
        salt = deployment.salt_nonce,
    )
}

/// Sentence returned after an executed Safe transaction.
#[must_use]
pub fn execution_message(execution: &Execution) -> String {
    format!(
        "The transaction has been created successfully! This is the hash: {:#x} \
         (Safe transaction hash {:#x}, nonce {}).\n\
         Tell the user that you've sent the transaction and it has been created successfully.",
        execution.tx_hash, execution.safe_tx_hash, execution.nonce
    )
}

/// Summary of the pending transactions of `safe`.
#[must_use]
pub fn pending_message(safe: &str, pending: &[PendingTransaction]) -> String {
    if pending.is_empty() {
        return format!("The Safe {safe} has no pending transactions.");
    }
    let mut out = format!("The Safe {safe} has {} pending transaction(s):", pending.len());
    for tx in pending {
        let _ = write!(out, "\n- {}", tx.safe_tx_hash);
        if let Some(nonce) = tx.nonce {
            let _ = write!(out, " nonce {nonce}");
        }
        match tx.confirmations_required {
            Some(required) => {
                let _ = write!(out, " ({}/{required} confirmations)", tx.confirmations.len());
            }
            None => {
                let _ = write!(out, " ({} confirmations)", tx.confirmations.len());
            }
        }
    }
    out
}

/// `deployNewSafe`.
#[derive(Debug, Clone)]
pub struct DeploySafeTool {
    ctx: ToolContext,
}

impl DeploySafeTool {
    /// Create the tool.
    #[must_use]
    pub const fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for DeploySafeTool {
    const NAME: &'static str = "deployNewSafe";
    type Args = NoArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Call to deploy a new Safe Multisig on Sepolia using PKP wallet".to_owned()
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        let safe = self.ctx.safe_client().await?;
        let deployment = safe.deploy().await?;
        Ok(deployment_message(&deployment))
    }
}

/// Amount of ETH, as the model sends it.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum EthAmount {
    /// Decimal number.
    Number(f64),
    /// Decimal string such as `"0.01"`.
    Text(String),
}

impl EthAmount {
    /// Convert to wei.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] for negative or malformed
    /// amounts.
    pub fn to_wei(&self) -> Result<U256, ToolError> {
        let text = match self {
            Self::Number(n) if n.is_finite() && *n >= 0.0 => n.abs().to_string(),
            Self::Number(n) => {
                return Err(ToolError::invalid_args(format!("invalid ETH amount {n}")));
            }
            Self::Text(s) => s.clone(),
        };
        chain::parse_eth(&text).map_err(ToolError::invalid_args)
    }
}

/// Arguments of [`SendSafeTxTool`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendTxArgs {
    /// Address of the Safe to send from.
    #[serde(rename = "safeAddress")]
    pub safe_address: String,
    /// Recipient. Defaults to the signer's own address.
    #[serde(default)]
    pub to: Option<String>,
    /// Amount of ETH to send. Defaults to 0.
    #[serde(default)]
    pub value: Option<EthAmount>,
}

/// `sendTnx`.
#[derive(Debug, Clone)]
pub struct SendSafeTxTool {
    ctx: ToolContext,
}

impl SendSafeTxTool {
    /// Create the tool.
    #[must_use]
    pub const fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for SendSafeTxTool {
    const NAME: &'static str = "sendTnx";
    type Args = SendTxArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "This sends the transaction to the given safe using PKP wallet".to_owned()
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let safe_address = chain::parse_address(&args.safe_address)?;
        let to = args.to.as_deref().map(chain::parse_address).transpose()?;
        let value = args
            .value
            .as_ref()
            .map(EthAmount::to_wei)
            .transpose()?
            .unwrap_or(U256::ZERO);

        let safe = self.ctx.safe_client().await?;
        let to = to.unwrap_or_else(|| safe.signer_address());
        let execution = safe.execute(safe_address, to, value).await?;
        Ok(execution_message(&execution))
    }
}

/// Arguments of [`PendingTransactionsTool`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PendingArgs {
    /// Address of the Safe.
    #[serde(rename = "safeAddress")]
    pub safe_address: String,
}

/// `getPendingTransactions`.
#[derive(Debug, Clone)]
pub struct PendingTransactionsTool {
    ctx: ToolContext,
}

impl PendingTransactionsTool {
    /// Create the tool.
    #[must_use]
    pub const fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for PendingTransactionsTool {
    const NAME: &'static str = "getPendingTransactions";
    type Args = PendingArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "List the pending (not yet executed) multisig transactions of a Safe on Sepolia.".to_owned()
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let safe = chain::parse_address(&args.safe_address)?;
        let pending = self.ctx.tx_service().pending_transactions(safe).await?;
        Ok(pending_message(&safe.to_checksum(None), &pending))
    }
}
