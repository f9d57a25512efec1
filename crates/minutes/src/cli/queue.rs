//! Queue and backoff handlers, and the long-running drain worker.

use minutes::{
    DrainWorker, HttpReplayHandler, MinutesResult, Provider, RateLimiter, WorkerSettings,
    render_drain,
};
use std::sync::Arc;
use tracing::{error, info};

/// Replay up to `max_requests` queued requests over HTTP.
pub async fn process(limiter: &RateLimiter, max_requests: usize) -> MinutesResult<()> {
    println!("Processing up to {} queued requests...", max_requests);
    let report = limiter
        .process_queue(max_requests, &HttpReplayHandler::new())
        .await?;
    println!("{}", render_drain(&report));
    Ok(())
}

/// Lift backoff for `provider`, or every provider.
pub async fn clear_backoff(limiter: &RateLimiter, provider: Option<Provider>) {
    limiter.clear_backoff(provider).await;
    match provider {
        Some(p) => println!("Cleared backoff for {}", p),
        None => println!("Cleared all backoff periods"),
    }
}

/// Drop queued requests for `provider`, or every provider.
pub async fn clear_queue(limiter: &RateLimiter, provider: Option<Provider>) -> MinutesResult<()> {
    let removed = limiter.clear_queue(provider).await?;
    match provider {
        Some(p) => println!("Cleared queue for {} ({} requests removed)", p, removed),
        None => println!("Cleared all request queues ({} requests removed)", removed),
    }
    Ok(())
}

/// Drain the queue on a schedule until Ctrl+C.
pub async fn run_worker(limiter: RateLimiter, settings: WorkerSettings) -> MinutesResult<()> {
    let (worker, handle) = DrainWorker::new(limiter, Arc::new(HttpReplayHandler::new()), settings);
    let task = worker.spawn(&handle);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Stopping drain worker");
    handle.shutdown().await;
    if let Err(e) = task.await {
        error!(error = %e, "Drain worker task failed");
    }
    Ok(())
}
