//! Configuration for retries, the request queue and the drain worker.
//!
//! Configuration is layered with the `config` crate:
//! 1. Bundled defaults (include_str! from minutes.toml)
//! 2. User config in the home directory (~/.config/minutes/minutes.toml)
//! 3. User config in the current directory (./minutes.toml)
//! 4. `RATE_LIMIT_*` environment variables, for the `[retry]` section only
//!
//! Later sources override earlier ones.

use config::{Config, Environment, File, FileFormat};
use minutes_error::{ConfigError, IoError, MinutesError, MinutesResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../minutes.toml");

/// Retry and backoff policy shared by every provider call.
///
/// A `RetryConfig` is immutable once loaded. To change it, build a new value
/// and hand it to `RateLimiter::configure`, which validates and swaps it in
/// atomically.
///
/// # Example
///
/// ```toml
/// [retry]
/// max_retries = 5
/// base_delay = 1.0
/// max_delay = 60.0
/// exponential_base = 2.0
/// jitter = true
/// jitter_max = 0.1
/// rate_limit_delay = 60.0
/// quota_exceeded_delay = 3600.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// First exponential delay, in seconds
    pub base_delay: f64,
    /// Ceiling for exponential delays, in seconds
    pub max_delay: f64,
    /// Growth factor between exponential delays
    pub exponential_base: f64,
    /// Add a random offset to every delay
    pub jitter: bool,
    /// Largest jitter offset as a fraction of the delay
    pub jitter_max: f64,
    /// Wait after a rate-limit response, in seconds
    pub rate_limit_delay: f64,
    /// Wait after a quota-exceeded response, in seconds
    pub quota_exceeded_delay: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: 1.0,
            max_delay: 60.0,
            exponential_base: 2.0,
            jitter: true,
            jitter_max: 0.1,
            rate_limit_delay: 60.0,
            quota_exceeded_delay: 3600.0,
        }
    }
}

impl RetryConfig {
    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first field out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > 20 {
            return Err(ConfigError::for_key(
                "max_retries",
                format!("must be in 0..=20, got {}", self.max_retries),
            ));
        }
        check_range("base_delay", self.base_delay, 0.1, 10.0)?;
        check_range("max_delay", self.max_delay, 1.0, 300.0)?;
        if self.max_delay < self.base_delay {
            return Err(ConfigError::for_key(
                "max_delay",
                format!(
                    "{} must be >= base_delay ({})",
                    self.max_delay, self.base_delay
                ),
            ));
        }
        check_range("exponential_base", self.exponential_base, 1.1, 5.0)?;
        check_range("jitter_max", self.jitter_max, 0.0, 1.0)?;
        check_range("rate_limit_delay", self.rate_limit_delay, 1.0, 3600.0)?;
        check_range("quota_exceeded_delay", self.quota_exceeded_delay, 60.0, 86400.0)?;
        Ok(())
    }

    /// Whether a quota-exceeded failure should go straight to the queue.
    ///
    /// When the quota wait is at least as long as the rate-limit wait, blocking
    /// in-process is never worth it and the request is deferred at once.
    pub fn defers_quota(&self) -> bool {
        self.quota_exceeded_delay >= self.rate_limit_delay
    }

    /// Total attempts allowed for one execution.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `rate_limit_delay` as a duration.
    pub fn rate_limit_wait(&self) -> Duration {
        secs(self.rate_limit_delay)
    }

    /// `quota_exceeded_delay` as a duration.
    pub fn quota_wait(&self) -> Duration {
        secs(self.quota_exceeded_delay)
    }

    /// Layer `RATE_LIMIT_*` environment variables over this config.
    ///
    /// Variable names are the field names in upper case, e.g.
    /// `RATE_LIMIT_MAX_RETRIES` or `RATE_LIMIT_RATE_LIMIT_DELAY`.
    #[instrument(skip(self))]
    pub fn with_env_overrides(&self) -> MinutesResult<Self> {
        let base = Config::try_from(self).map_err(|e| {
            MinutesError::from(ConfigError::new(format!(
                "Failed to encode retry configuration: {}",
                e
            )))
        })?;

        let merged: RetryConfig = Config::builder()
            .add_source(base)
            .add_source(
                Environment::with_prefix("RATE_LIMIT")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                MinutesError::from(ConfigError::new(format!(
                    "Failed to read RATE_LIMIT_* variables: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MinutesError::from(ConfigError::new(format!(
                    "Failed to parse RATE_LIMIT_* variables: {}",
                    e
                )))
            })?;

        debug!(?merged, "Applied environment overrides to retry configuration");
        Ok(merged)
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::for_key(
            field,
            format!("must be in {}..={}, got {}", min, max, value),
        ))
    }
}

/// Longest single wait, in seconds. Matches the `quota_exceeded_delay` ceiling.
pub(crate) const MAX_WAIT_SECS: u64 = 86_400;

/// Seconds to `Duration`, saturating at [`MAX_WAIT_SECS`].
///
/// Negative and NaN values become zero; infinite or oversized values become
/// the ceiling, so a huge wait never collapses into an immediate retry.
pub(crate) fn secs(value: f64) -> Duration {
    let ceiling = Duration::from_secs(MAX_WAIT_SECS);
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value)
        .map(|d| d.min(ceiling))
        .unwrap_or(ceiling)
}

/// Where and how deferred requests are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// SQLite database path (overridden by `DATABASE_URL`)
    pub database_url: String,
    /// Maximum number of queued requests across all providers
    pub max_size: usize,
    /// Seconds after which a drain's lease on a request expires
    pub claim_timeout_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            database_url: String::from("minutes_queue.db"),
            max_size: 1000,
            claim_timeout_secs: 300,
        }
    }
}

impl QueueSettings {
    /// Lease expiry as a duration.
    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs)
    }
}

/// Scheduling for the background drain worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Seconds between drain cycles
    pub interval_secs: u64,
    /// Maximum requests replayed per cycle
    pub batch_size: usize,
    /// Pause between replayed requests within a cycle, in milliseconds
    pub inter_request_delay_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            batch_size: 10,
            inter_request_delay_ms: 500,
        }
    }
}

impl WorkerSettings {
    /// Cycle interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Per-request pause as a duration.
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }
}

/// Top-level Minutes configuration.
///
/// # Example
///
/// ```no_run
/// use minutes_rate_limit::MinutesConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = MinutesConfig::load()?;
/// println!("max retries: {}", config.retry.max_retries);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinutesConfig {
    /// Retry and backoff policy
    #[serde(default)]
    pub retry: RetryConfig,
    /// Request queue storage
    #[serde(default)]
    pub queue: QueueSettings,
    /// Background drain scheduling
    #[serde(default)]
    pub worker: WorkerSettings,
}

impl MinutesConfig {
    /// Load configuration from a specific file path, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the retry
    /// section is out of range.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> MinutesResult<Self> {
        debug!("Loading configuration from file");

        let config: MinutesConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                MinutesError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MinutesError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.retry.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: environment > current dir > home dir > bundled.
    ///
    /// User config files are optional and silently skipped if missing.
    #[instrument]
    pub fn load() -> MinutesResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/minutes/minutes.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("minutes").required(false));

        let mut config: MinutesConfig = builder
            .build()
            .map_err(|e| {
                MinutesError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                MinutesError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.retry = config.retry.with_env_overrides()?;
        config.retry.validate()?;
        Ok(config)
    }

    /// The bundled defaults, ignoring user files and the environment.
    pub fn bundled() -> MinutesResult<Self> {
        toml::from_str(DEFAULT_CONFIG).map_err(|e| {
            MinutesError::from(ConfigError::new(format!(
                "Bundled configuration is invalid: {}",
                e
            )))
        })
    }

    /// Write this configuration as TOML.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> MinutesResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| {
            MinutesError::from(ConfigError::new(format!(
                "Failed to encode configuration: {}",
                e
            )))
        })?;
        std::fs::write(path.as_ref(), text).map_err(IoError::from)?;
        debug!("Configuration saved");
        Ok(())
    }
}
