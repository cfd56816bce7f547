//! Interactive REPL around a pact [`Agent`].

use std::io::{self, Write};

use pact::agent::{Agent, RunConfig, RunResult, Runner};
use pact::memory::InMemoryStore;

/// Configuration for the chatbot.
#[derive(Debug, Clone, Default)]
pub struct ChatBotConfig {
    /// Thread to resume; a fresh one is created when absent.
    pub thread_id: Option<String>,
    /// Whether to display token usage after each response.
    pub show_usage: bool,
}

/// A CLI chatbot keeping per-thread history in memory.
#[derive(Debug)]
pub struct ChatBot {
    agent: Agent,
    config: ChatBotConfig,
    store: InMemoryStore,
    thread_id: String,
}

fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ChatBot {
    /// Create a new chatbot.
    #[must_use]
    pub fn new(agent: Agent, config: ChatBotConfig) -> Self {
        let thread_id = config.thread_id.clone().unwrap_or_else(new_thread_id);
        Self {
            agent,
            config,
            store: InMemoryStore::new(),
            thread_id,
        }
    }

    /// Current thread id.
    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Run one prompt on the current thread.
    ///
    /// # Errors
    ///
    /// Propagates model and session errors.
    pub async fn ask(&self, prompt: &str) -> pact::Result<RunResult> {
        let session = self.store.session(&self.thread_id).await;
        Runner::run(&self.agent, prompt, RunConfig::new().session(session)).await
    }

    fn print_result(&self, result: &RunResult) {
        println!("{}", result.reply.result);
        if result.reply.tool_used != "none" {
            println!("[tool: {}]", result.reply.tool_used);
        }
        if self.config.show_usage {
            println!(
                "[Tokens: {} in / {} out, {} step(s)]",
                result.usage.input_tokens, result.usage.output_tokens, result.steps
            );
        }
    }

    /// Run the interactive loop until `exit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error only when stdout cannot be written.
    pub async fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        println!("pact (thread {})", self.thread_id);
        println!("Type 'exit' to quit, 'clear' to reset history, 'new' for a new thread.");
        println!();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.read_line(&mut input) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => continue,
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match input {
                "exit" | "quit" => break,
                "clear" => {
                    self.store.remove(&self.thread_id).await;
                    println!("History cleared.");
                    continue;
                }
                "new" => {
                    self.thread_id = new_thread_id();
                    println!("New thread {}.", self.thread_id);
                    continue;
                }
                _ => {}
            }

            println!();
            match self.ask(input).await {
                Ok(result) => self.print_result(&result),
                Err(e) => println!("Error: {e}"),
            }
            println!();
        }

        Ok(())
    }
}
