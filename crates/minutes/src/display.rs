//! Human-readable rendering of rate limit status and drain results.

use chrono::{DateTime, Utc};
use minutes_rate_limit::{DrainReport, ProviderStatus, RetryConfig};
use std::fmt::Write;

fn limit_line(label: &str, remaining: Option<u64>, limit: Option<u64>, fraction: Option<f64>) -> String {
    match (remaining, limit, fraction) {
        (Some(remaining), Some(limit), Some(fraction)) => format!(
            "  {} limit: {}/{} ({:.1}% remaining)",
            label,
            remaining,
            limit,
            fraction * 100.0
        ),
        _ => format!("  {} limit: Unknown", label),
    }
}

/// Render one block per provider, as shown by `minutes status`.
pub fn render_status(statuses: &[ProviderStatus], now: DateTime<Utc>) -> String {
    let mut out = String::from("=== AI API Rate Limit Status ===\n");
    for status in statuses {
        let quota = &status.quota;
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", status.provider.as_str().to_uppercase());
        let _ = writeln!(
            out,
            "  Recent requests (last minute): {}",
            status.requests_last_minute
        );
        let _ = writeln!(
            out,
            "{}",
            limit_line(
                "Request",
                quota.requests_remaining,
                quota.requests_limit,
                status.remaining.requests
            )
        );
        let _ = writeln!(
            out,
            "{}",
            limit_line(
                "Token",
                quota.tokens_remaining,
                quota.tokens_limit,
                status.remaining.tokens
            )
        );
        let _ = writeln!(out, "  Queue size: {}", status.queue_size);
        let _ = writeln!(out, "  Backoff status: {}", status.backoff_label(now));
        if let Some(reset) = quota.requests_reset_at {
            let _ = writeln!(
                out,
                "  Request reset: {}",
                reset.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        if let Some(alert) = status.alert {
            let _ = writeln!(out, "  Alert: {}", alert);
        }
    }
    out
}

/// Summary lines for one drain pass.
pub fn render_drain(report: &DrainReport) -> String {
    if report.processed == 0 {
        return format!(
            "No requests were processed (queue empty or rate limits active). {} still queued.",
            report.remaining
        );
    }
    let mut line = format!(
        "Processed {} requests: {} succeeded, {} failed, {} requeued",
        report.processed, report.succeeded, report.failed, report.requeued
    );
    if report.abandoned > 0 {
        let _ = write!(line, ", {} abandoned", report.abandoned);
    }
    let _ = write!(line, ". {} still queued.", report.remaining);
    line
}

/// The active retry settings, one per line.
pub fn render_config(config: &RetryConfig) -> String {
    format!(
        "Current configuration:\n  Max retries: {}\n  Base delay: {}s\n  Max delay: {}s\n  Exponential base: {}\n  Rate limit delay: {}s\n  Quota exceeded delay: {}s\n  Jitter enabled: {} (max {:.0}%)\n",
        config.max_retries,
        config.base_delay,
        config.max_delay,
        config.exponential_base,
        config.rate_limit_delay,
        config.quota_exceeded_delay,
        config.jitter,
        config.jitter_max * 100.0
    )
}
