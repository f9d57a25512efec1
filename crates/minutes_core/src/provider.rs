//! LLM providers whose calls are rate limited.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An upstream LLM provider.
///
/// The string form is lowercase and parsing ignores case.
///
/// # Examples
///
/// ```
/// use minutes_core::Provider;
///
/// let provider: Provider = "OpenAI".parse().unwrap();
/// assert_eq!(provider, Provider::OpenAi);
/// assert_eq!(provider.to_string(), "openai");
/// assert!("gemini".parse::<Provider>().is_err());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    /// OpenAI (GPT models, Whisper)
    OpenAi,
    /// Anthropic (Claude models)
    Anthropic,
}

impl Provider {
    /// Lowercase name used in logs, storage keys and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    /// All providers in a stable order.
    pub fn all() -> Vec<Provider> {
        <Provider as strum::IntoEnumIterator>::iter().collect()
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known provider.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("unknown provider '{}' (expected openai or anthropic)", _0)]
pub struct UnknownProvider(pub String);

impl std::error::Error for UnknownProvider {}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}
