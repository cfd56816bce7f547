//! Pact CLI library.
//!
//! Provides the interactive chatbot used by the `pact` binary.

mod chatbot;

pub use chatbot::{ChatBot, ChatBotConfig};
