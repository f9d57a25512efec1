//! Partial retry settings supplied on the command line.

use minutes_rate_limit::RetryConfig;

/// Retry fields to change; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryOverrides {
    /// New `max_retries`
    pub max_retries: Option<u32>,
    /// New `base_delay`, seconds
    pub base_delay: Option<f64>,
    /// New `max_delay`, seconds
    pub max_delay: Option<f64>,
    /// New `exponential_base`
    pub exponential_base: Option<f64>,
    /// New `rate_limit_delay`, seconds
    pub rate_limit_delay: Option<f64>,
    /// New `quota_exceeded_delay`, seconds
    pub quota_exceeded_delay: Option<f64>,
    /// New `jitter` flag
    pub jitter: Option<bool>,
    /// New `jitter_max`, a fraction of the delay
    pub jitter_max: Option<f64>,
}

impl RetryOverrides {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// A copy of `base` with the set fields replaced. Not validated.
    pub fn apply(&self, base: &RetryConfig) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            base_delay: self.base_delay.unwrap_or(base.base_delay),
            max_delay: self.max_delay.unwrap_or(base.max_delay),
            exponential_base: self.exponential_base.unwrap_or(base.exponential_base),
            rate_limit_delay: self.rate_limit_delay.unwrap_or(base.rate_limit_delay),
            quota_exceeded_delay: self
                .quota_exceeded_delay
                .unwrap_or(base.quota_exceeded_delay),
            jitter: self.jitter.unwrap_or(base.jitter),
            jitter_max: self.jitter_max.unwrap_or(base.jitter_max),
        }
    }
}
