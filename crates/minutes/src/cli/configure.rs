//! Retry configuration handler.

use minutes::{MinutesConfig, MinutesResult, RateLimiter, RetryOverrides, render_config};
use tracing::instrument;

/// File written by `configure --save`.
const LOCAL_CONFIG: &str = "minutes.toml";

/// Apply `overrides` to the active retry settings and print the result.
///
/// The new settings are validated before they replace the old ones. They
/// only last for this process unless `save` writes them to `./minutes.toml`,
/// which every later invocation picks up.
#[instrument(skip(limiter, config))]
pub fn configure(
    limiter: &RateLimiter,
    config: &MinutesConfig,
    overrides: RetryOverrides,
    save: bool,
) -> MinutesResult<()> {
    if !overrides.is_empty() {
        let updated = overrides.apply(&limiter.config());
        limiter.configure(updated)?;
        println!("Rate limiter configuration updated");
    }

    let active = limiter.config();
    if save {
        let to_save = MinutesConfig {
            retry: (*active).clone(),
            ..config.clone()
        };
        to_save.save(LOCAL_CONFIG)?;
        println!("Saved configuration to ./{}", LOCAL_CONFIG);
    }

    println!();
    print!("{}", render_config(&active));
    Ok(())
}
