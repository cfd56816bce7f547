//! Agents and the runner that drives them.
//!
//! An [`Agent`] is configuration: instructions, a model, tools and limits.
//! The [`Runner`] executes it against a user input, optionally inside a
//! [`Session`](crate::memory::Session) that carries the thread history.
//!
//! ```rust,ignore
//! use pact::agent::{Agent, RunConfig, Runner};
//!
//! let agent = Agent::pact(model, pact::tools::all(&ctx));
//! let result = Runner::run(&agent, "What is the ETH price?", RunConfig::new()).await?;
//! println!("{}", result.reply.result);
//! ```

mod config;
mod result;
mod runner;

pub use config::{Agent, DEFAULT_MAX_STEPS, OutputSchema, SYSTEM_PROMPT};
pub use result::{AgentReply, NextStep, RunConfig, RunResult, StepInfo, ToolCallRecord};
pub use runner::Runner;
