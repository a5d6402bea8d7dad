//! CLI module for keybroker
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `serve` - Start the broker
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start in direct mode, credential from the environment
//! GEMINI_API_KEY=... keybroker serve
//!
//! # Forward to another broker instead of holding a credential
//! keybroker serve --backend-url https://broker.internal:3001
//!
//! # Generate shell completions
//! keybroker completions bash > ~/.bash_completion.d/keybroker
//! ```

pub mod completions;
pub mod config;
pub mod serve;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// keybroker - credential-holding proxy for generative model calls
#[derive(Parser, Debug)]
#[command(
    name = "keybroker",
    version,
    about = "Rate-limited broker that keeps model API keys away from browsers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the broker server
    Serve(ServeArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "keybroker.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "KEYBROKER_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "KEYBROKER_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "KEYBROKER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Forward requests to another broker (proxy mode)
    #[arg(short, long, env = "KEYBROKER_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Start even if no upstream credential is set; requests get 503
    #[arg(long)]
    pub allow_missing_credential: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "keybroker.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
