//! Pact is an accountability agent: an LLM with tools for Sepolia balances,
//! ETH prices, USDC reward splits and Safe multisig operations, signing
//! through a custody-held PKP.
//!
//! The pieces:
//!
//! - [`agent`]: agent builder and the ReAct [`Runner`](agent::Runner)
//! - [`providers`]: the [`Model`](providers::Model) trait, Ollama and a mock
//! - [`tools`]: the agent's tools and their shared [`ToolContext`](tools::ToolContext)
//! - [`custody`]: SIWE session signatures and the lazily initialized signer
//! - [`safe`]: Safe deployment, execution and the transaction service
//! - [`config`]: settings from the environment
#![allow(tail_expr_drop_order)]

pub mod agent;
pub mod chain;
pub mod config;
pub mod custody;
pub mod error;
pub mod memory;
pub mod message;
pub mod prelude;
pub mod price;
pub mod providers;
pub mod safe;
pub mod tool;
pub mod tools;

pub use error::{Error, Result};
