//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod printer;
pub mod say;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::core::chat_stream::HttpBackendConfig;
use crate::core::config::Config;
use crate::core::session::SessionSettings;

#[derive(Parser)]
#[command(name = "kongkow")]
#[command(about = "A streaming chat client for OpenAI-compatible APIs")]
#[command(
    long_about = "Kongkow is a line-mode chat client that streams replies from any \
OpenAI-compatible chat completions API into a running conversation.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    Your API key (required)\n\
  OPENAI_BASE_URL   Custom API base URL (optional, defaults to https://api.openai.com/v1)\n\
  RUST_LOG          Diagnostic log filter (optional, defaults to warn)\n\n\
Commands inside the chat:\n\
  /help             List commands\n\
  /clear            Start a fresh conversation\n\
  /react <n> <e>    Toggle a reaction on message n\n\
  /history          Show the numbered conversation\n\
  /log <filename>   Enable logging to the specified file\n\
  /quit             Leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// Base URL of the chat completions API
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to a config file (defaults to the platform config directory)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,

    /// Print each finished reply as rendered HTML
    #[arg(long, global = true)]
    pub markdown: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send a single prompt and print the streamed reply
    Say {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
}

/// Everything a front end needs once flags, config and environment are merged.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub backend: HttpBackendConfig,
    pub session: SessionSettings,
    pub log_file: Option<String>,
    pub markdown: bool,
}

#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
        }
    }
}

/// Flags override the config file, which overrides the environment base URL
/// and the built-in defaults.
pub fn resolve_settings(
    args: &Args,
    config: &Config,
    env: EnvOverrides,
) -> Result<RuntimeSettings, Box<dyn Error>> {
    let api_key = env
        .api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or(
            "OPENAI_API_KEY environment variable not set\n\n\
Please set your API key:\n\
export OPENAI_API_KEY=\"your-api-key-here\"",
        )?;

    let mut backend = config.backend_config(api_key);
    if let Some(base_url) = args
        .base_url
        .clone()
        .or_else(|| config.base_url.clone())
        .or(env.base_url)
    {
        backend.base_url = base_url;
    }
    if let Some(model) = &args.model {
        backend.model = model.clone();
    }

    Ok(RuntimeSettings {
        backend,
        session: config.session_settings(),
        log_file: args.log.clone(),
        markdown: args.markdown || config.markdown_enabled(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let settings = match resolve_settings(&args, &config, EnvOverrides::from_env()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            std::process::exit(1);
        }
    };

    match args.command {
        Some(Commands::Say { prompt }) => say::run_say(prompt, settings).await,
        Some(Commands::Chat) | None => chat::run_chat(settings).await,
    }
}
