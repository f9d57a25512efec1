//! Status, watch, export and import handlers.

use super::OutputFormat;
use chrono::Utc;
use minutes::{MinutesResult, RateLimiter, StatusReport, render_status};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Print the status of every provider.
pub async fn show_status(limiter: &RateLimiter, format: OutputFormat) -> MinutesResult<()> {
    match format {
        OutputFormat::Human => {
            let statuses = limiter.status_all().await?;
            println!("{}", render_status(&statuses, Utc::now()));
        }
        OutputFormat::Json => {
            let report = limiter.export_status().await?;
            println!("{}", report.to_json()?);
        }
    }
    Ok(())
}

/// Redraw the status every `interval_secs` until Ctrl+C.
#[instrument(skip(limiter))]
pub async fn watch(limiter: &RateLimiter, interval_secs: u64) -> MinutesResult<()> {
    println!(
        "Watching rate limits (refresh every {}s). Press Ctrl+C to stop.\n",
        interval_secs
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let statuses = limiter.status_all().await?;
                print!("\x1b[2J\x1b[H");
                println!("Last updated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
                println!("{}", render_status(&statuses, Utc::now()));
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nMonitoring stopped");
                return Ok(());
            }
        }
    }
}

/// Write a status report to `file`.
#[instrument(skip(limiter), fields(file = %file.display()))]
pub async fn export(limiter: &RateLimiter, file: &Path) -> MinutesResult<()> {
    let report = limiter.export_status().await?;
    report.write_to(file)?;
    info!(providers = report.rate_limits.len(), "Status exported");
    println!("Rate limit status exported to {}", file.display());
    Ok(())
}

/// Restore quota state from a report written by [`export`].
#[instrument(skip(limiter), fields(file = %file.display()))]
pub async fn import(limiter: &RateLimiter, file: &Path) -> MinutesResult<()> {
    let report = StatusReport::read_from(file)?;
    limiter.import_status(&report).await;
    println!(
        "Imported status for {} providers (taken {})",
        report.rate_limits.len(),
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
