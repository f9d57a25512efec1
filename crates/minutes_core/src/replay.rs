//! Replayable HTTP request payloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An HTTP call captured so it can be replayed from the queue.
///
/// Only non-secret headers belong here. API keys are injected when the
/// request is replayed, so nothing sensitive is written to the queue.
///
/// # Examples
///
/// ```
/// use minutes_core::ReplayRequest;
/// use serde_json::json;
///
/// let request = ReplayRequest::post(
///     "https://api.openai.com/v1/chat/completions",
///     json!({"model": "gpt-4o-mini", "messages": []}),
/// )
/// .with_header("openai-beta", "assistants=v2");
///
/// let payload = request.to_payload().unwrap();
/// let back = ReplayRequest::from_payload(&payload).unwrap();
/// assert_eq!(back, request);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ReplayRequest {
    /// HTTP method, uppercase
    method: String,
    /// Absolute URL
    url: String,
    /// Extra headers to send, without credentials
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// JSON request body
    #[serde(default)]
    body: serde_json::Value,
}

impl ReplayRequest {
    /// Build a request with an explicit method.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Build a POST request, the shape of every chat/completion call.
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new("POST", url, body)
    }

    /// Add a non-secret header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Encode as an opaque queue payload.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Decode from a queue payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}
