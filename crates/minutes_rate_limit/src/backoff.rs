//! Backoff delay computation.

use crate::config::secs;
use crate::{ErrorKind, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Un-jittered delay before retry number `attempt` (1-based).
///
/// - `RateLimited`: `rate_limit_delay`, raised to the provider's
///   `retry-after` when that is longer (a non-finite hint is ignored)
/// - `QuotaExceeded`: `quota_exceeded_delay`
/// - `ServerError`, `ConnectionError`, `Unknown`:
///   `min(max_delay, base_delay * exponential_base^(attempt - 1))`
/// - `ClientError`: `None`, never retried
///
/// # Examples
///
/// ```
/// use minutes_rate_limit::{base_delay_for, ErrorKind, RetryConfig};
/// use std::time::Duration;
///
/// let config = RetryConfig::default();
/// assert_eq!(base_delay_for(ErrorKind::ServerError, 3, None, &config), Some(Duration::from_secs(4)));
/// assert_eq!(base_delay_for(ErrorKind::ServerError, 7, None, &config), Some(Duration::from_secs(60)));
/// assert_eq!(base_delay_for(ErrorKind::ClientError, 1, None, &config), None);
/// ```
pub fn base_delay_for(
    kind: ErrorKind,
    attempt: u32,
    retry_after: Option<f64>,
    config: &RetryConfig,
) -> Option<Duration> {
    match kind {
        ErrorKind::ClientError => None,
        ErrorKind::RateLimited => {
            let hinted = retry_after
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(0.0);
            Some(secs(config.rate_limit_delay.max(hinted)))
        }
        ErrorKind::QuotaExceeded => Some(secs(config.quota_exceeded_delay)),
        ErrorKind::ServerError | ErrorKind::ConnectionError | ErrorKind::Unknown => {
            let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
            let delay = config.base_delay * config.exponential_base.powi(exponent);
            let capped = if delay.is_finite() {
                delay.min(config.max_delay)
            } else {
                config.max_delay
            };
            Some(secs(capped))
        }
    }
}

/// Delay before retry number `attempt`, with jitter when enabled.
pub fn next_delay(
    kind: ErrorKind,
    attempt: u32,
    retry_after: Option<f64>,
    config: &RetryConfig,
) -> Option<Duration> {
    let base = base_delay_for(kind, attempt, retry_after, config)?;
    Some(add_jitter(base, config, &mut rand::thread_rng()))
}

/// Default waits before each retry: the exponential schedule, jittered.
///
/// Has `max_retries` entries, one per retry. The retry loop consumes one per
/// retry; failures whose wait is not exponential override the entry.
///
/// # Examples
///
/// ```
/// use minutes_rate_limit::{RetryConfig, retry_schedule};
/// use std::time::Duration;
///
/// let config = RetryConfig { max_retries: 3, jitter: false, ..RetryConfig::default() };
/// assert_eq!(
///     retry_schedule(&config),
///     vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
/// );
/// ```
pub fn retry_schedule(config: &RetryConfig) -> Vec<Duration> {
    (1..=config.max_retries)
        .filter_map(|attempt| next_delay(ErrorKind::ServerError, attempt, None, config))
        .collect()
}

/// Add a uniform offset in `[0, delay * jitter_max]`.
///
/// The offset is never negative, so the result is never shorter than `delay`.
pub fn add_jitter<R: Rng + ?Sized>(delay: Duration, config: &RetryConfig, rng: &mut R) -> Duration {
    if !config.jitter || config.jitter_max <= 0.0 || delay.is_zero() {
        return delay;
    }
    let spread = delay.as_secs_f64() * config.jitter_max.min(1.0);
    if !spread.is_finite() || spread <= 0.0 {
        return delay;
    }
    let offset = rng.gen_range(0.0..=spread);
    delay + secs(offset)
}
