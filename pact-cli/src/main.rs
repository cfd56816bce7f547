//! Pact CLI - chat with the accountability agent from the terminal.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pact::agent::Agent;
use pact::config::Settings;
use pact::providers::{OllamaClient, SharedModel};
use pact::tools::{self, ToolContext};
use pact_cli::{ChatBot, ChatBotConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Pact CLI - accountability agent with Safe and PKP tools
#[derive(Parser, Debug)]
#[command(name = "pact")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Chat model served by Ollama
    #[arg(short, long, global = true, env = "PACT_MODEL")]
    model: Option<String>,

    /// Ollama server URL
    #[arg(long, global = true, env = "OLLAMA_HOST")]
    ollama_url: Option<String>,

    /// Sepolia JSON-RPC URL
    #[arg(long, global = true, env = "SEPOLIA_RPC_URL")]
    rpc_url: Option<String>,

    /// Maximum reasoning steps per prompt
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    /// Show token usage after each response
    #[arg(long, global = true)]
    usage: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive chat (default)
    Chat {
        /// Thread id to use for history
        #[arg(short, long)]
        thread: Option<String>,
    },
    /// Run a single prompt and print the JSON reply
    Ask {
        /// Prompt text
        prompt: String,
        /// Thread id to use for history
        #[arg(short, long)]
        thread: Option<String>,
    },
    /// Print the tool definitions sent to the model
    Tools,
    /// Initialize the signer and print its address
    Signer,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pact=debug,pact_cli=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pact=warn,pact_cli=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = Settings::from_env().context("reading configuration")?;
    if let Some(model) = &args.model {
        settings = settings.with_model(model);
    }
    if let Some(url) = &args.ollama_url {
        settings = settings.with_ollama_url(url);
    }
    if let Some(url) = &args.rpc_url {
        settings = settings.with_rpc_url(url);
    }
    Ok(settings)
}

fn build_agent(
    settings: &Settings,
    ctx: &ToolContext,
    max_steps: Option<usize>,
) -> anyhow::Result<Agent> {
    let client = OllamaClient::builder()
        .base_url(&settings.ollama_url)
        .build()
        .context("building Ollama client")?;
    let model: SharedModel = Arc::new(client.completion_model(&settings.model));
    let mut agent = Agent::pact(model, tools::all(ctx));
    if let Some(steps) = max_steps {
        agent = agent.max_steps(steps);
    }
    Ok(agent)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads its env fallbacks.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.verbose);

    let settings = settings(&args)?;
    let signer = Arc::new(settings.signer_cell());
    let ctx = ToolContext::from_settings(&settings, Arc::clone(&signer));

    match args.command.unwrap_or(Command::Chat { thread: None }) {
        Command::Chat { thread } => {
            let agent = build_agent(&settings, &ctx, args.max_steps)?;
            let config = ChatBotConfig {
                thread_id: thread,
                show_usage: args.usage,
            };
            ChatBot::new(agent, config).run().await?;
        }
        Command::Ask { prompt, thread } => {
            let agent = build_agent(&settings, &ctx, args.max_steps)?;
            let config = ChatBotConfig {
                thread_id: thread,
                show_usage: args.usage,
            };
            let result = ChatBot::new(agent, config).ask(&prompt).await?;
            println!("{}", serde_json::to_string_pretty(&result.reply)?);
        }
        Command::Tools => {
            let definitions: Vec<_> = tools::all(&ctx).iter().map(|t| t.definition()).collect();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Command::Signer => {
            let handle = signer.get().await.context("initializing signer")?;
            println!("{} ({})", handle.address(), handle.kind());
        }
    }

    Ok(())
}
