//! Minutes CLI binary.
//!
//! This binary provides operator access to the rate limiter:
//! - Inspect quota, backoff and queue status (once or continuously)
//! - Replay queued requests, or run the background drain worker
//! - Clear backoff windows and queues, tune retry settings
//! - Export and import quota state

use clap::Parser;
use tracing::debug;
use minutes::{MinutesConfig, ObservabilityConfig, RetryOverrides, init_observability, open_limiter};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        Cli, Commands, clear_backoff, clear_queue, configure, export, import, process,
        run_worker, show_status, watch,
    };

    // Load .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut observability = ObservabilityConfig::new().with_json_logs(cli.json_logs);
    if cli.verbose {
        observability = observability.with_log_level("debug");
    }
    init_observability(&observability)?;

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(e) => debug!(error = %e, "No environment file loaded"),
    }

    let config = match &cli.config {
        Some(path) => MinutesConfig::from_file(path)?,
        None => MinutesConfig::load()?,
    };
    let limiter = open_limiter(&config).await?;

    // Execute the requested command
    match cli.command {
        Commands::Status { format } => {
            show_status(&limiter, format).await?;
        }

        Commands::Watch { interval } => {
            watch(&limiter, interval).await?;
        }

        Commands::Process { max_requests } => {
            process(&limiter, max_requests).await?;
        }

        Commands::ClearBackoff { provider } => {
            clear_backoff(&limiter, provider).await;
        }

        Commands::ClearQueue { provider } => {
            clear_queue(&limiter, provider).await?;
        }

        Commands::Configure {
            max_retries,
            base_delay,
            max_delay,
            exponential_base,
            rate_limit_delay,
            quota_delay,
            jitter,
            jitter_max,
            save,
        } => {
            let overrides = RetryOverrides {
                max_retries,
                base_delay,
                max_delay,
                exponential_base,
                rate_limit_delay,
                quota_exceeded_delay: quota_delay,
                jitter,
                jitter_max,
            };
            configure(&limiter, &config, overrides, save)?;
        }

        Commands::Export { file } => {
            export(&limiter, &file).await?;
        }

        Commands::Import { file } => {
            import(&limiter, &file).await?;
        }

        Commands::Worker => {
            run_worker(limiter, config.worker.clone()).await?;
        }
    }

    Ok(())
}
