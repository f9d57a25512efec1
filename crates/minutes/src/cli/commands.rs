//! CLI command definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use minutes::Provider;
use std::path::PathBuf;

/// Minutes - rate limit, retry and request queue operations for LLM providers
#[derive(Parser, Debug)]
#[command(name = "minutes")]
#[command(about = "Inspect and operate the LLM rate limiter and request queue", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Read configuration from this file instead of the layered defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show quota, backoff and queue status for every provider
    Status {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Redraw the status periodically until interrupted
    Watch {
        /// Refresh interval in seconds
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },

    /// Replay queued requests now
    Process {
        /// Maximum number of requests to replay
        #[arg(short = 'n', long, default_value = "10")]
        max_requests: usize,
    },

    /// Lift backoff for one provider, or all of them
    ClearBackoff {
        /// Provider to clear (openai, anthropic)
        #[arg(short, long)]
        provider: Option<Provider>,
    },

    /// Drop queued requests for one provider, or all of them
    ClearQueue {
        /// Provider to clear (openai, anthropic)
        #[arg(short, long)]
        provider: Option<Provider>,
    },

    /// Change retry settings (validated; use --save to keep them)
    Configure {
        /// Maximum number of retries
        #[arg(long)]
        max_retries: Option<u32>,

        /// Base delay in seconds
        #[arg(long)]
        base_delay: Option<f64>,

        /// Maximum delay in seconds
        #[arg(long)]
        max_delay: Option<f64>,

        /// Growth factor between exponential delays
        #[arg(long)]
        exponential_base: Option<f64>,

        /// Rate limit delay in seconds
        #[arg(long)]
        rate_limit_delay: Option<f64>,

        /// Quota exceeded delay in seconds
        #[arg(long)]
        quota_delay: Option<f64>,

        /// Enable or disable jitter
        #[arg(long, action = ArgAction::Set)]
        jitter: Option<bool>,

        /// Largest jitter offset as a fraction of the delay
        #[arg(long)]
        jitter_max: Option<f64>,

        /// Write the resulting configuration to ./minutes.toml
        #[arg(long)]
        save: bool,
    },

    /// Export status to a JSON file
    Export {
        /// Output filename
        file: PathBuf,
    },

    /// Restore quota state from an exported JSON file
    Import {
        /// Input filename
        file: PathBuf,
    },

    /// Run the background drain worker until interrupted
    Worker,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
