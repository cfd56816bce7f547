//! Ollama provider.
//!
//! Talks to a local (or remote) Ollama server through its `/api/chat`
//! endpoint. No API key is required.

mod client;
mod completion;

pub use client::{OLLAMA_API_BASE_URL, OllamaClient, OllamaClientBuilder};
pub use completion::CompletionModel;
