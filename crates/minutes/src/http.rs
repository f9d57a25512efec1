//! HTTP replay of queued provider calls.

use async_trait::async_trait;
use minutes_core::{Provider, QueuedRequest, ReplayRequest};
use minutes_error::ProviderError;
use minutes_interface::{ProviderResponse, ReplayHandler};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Replays queued [`ReplayRequest`] payloads over HTTP.
///
/// Credentials are never stored in the queue. They are read from
/// `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` at replay time, unless a key was
/// set explicitly with [`HttpReplayHandler::with_api_key`].
#[derive(Debug, Clone, Default)]
pub struct HttpReplayHandler {
    client: Client,
    api_keys: BTreeMap<Provider, String>,
}

impl HttpReplayHandler {
    /// Create a handler with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Use `key` for `provider` instead of the environment.
    pub fn with_api_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.api_keys.insert(provider, key.into());
        self
    }

    fn api_key(&self, provider: Provider) -> Option<String> {
        self.api_keys
            .get(&provider)
            .cloned()
            .or_else(|| std::env::var(provider.api_key_var()).ok())
    }

    fn build_headers(
        &self,
        provider: Provider,
        request: &ReplayRequest,
    ) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        for (name, value) in request.headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ProviderError::with_status(400, format!("Invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ProviderError::with_status(400, format!("Invalid header value: {}", e))
            })?;
            headers.insert(name, value);
        }

        let Some(key) = self.api_key(provider) else {
            return Err(ProviderError::with_status(
                401,
                format!("{} is not set", provider.api_key_var()),
            ));
        };
        let invalid_key =
            |e: reqwest::header::InvalidHeaderValue| ProviderError::with_status(401, e.to_string());
        match provider {
            Provider::OpenAi => {
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", key)).map_err(invalid_key)?,
                );
            }
            Provider::Anthropic => {
                headers.insert("x-api-key", HeaderValue::from_str(&key).map_err(invalid_key)?);
                if !headers.contains_key("anthropic-version") {
                    headers.insert(
                        "anthropic-version",
                        HeaderValue::from_static(ANTHROPIC_VERSION),
                    );
                }
            }
        }
        Ok(headers)
    }
}

/// Seconds from a `retry-after` header, when it holds a finite, non-negative number.
fn retry_after_secs(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[async_trait]
impl ReplayHandler for HttpReplayHandler {
    #[instrument(skip(self, request), fields(id = %request.id(), provider = %request.provider()))]
    async fn replay(
        &self,
        request: &QueuedRequest,
    ) -> Result<ProviderResponse<serde_json::Value>, ProviderError> {
        let provider = *request.provider();
        let replay = ReplayRequest::from_payload(request.payload()).map_err(|e| {
            ProviderError::with_status(400, format!("Payload is not a replayable request: {}", e))
        })?;
        let method = Method::from_bytes(replay.method().as_bytes()).map_err(|e| {
            ProviderError::with_status(400, format!("Invalid method '{}': {}", replay.method(), e))
        })?;
        let headers = self.build_headers(provider, &replay)?;

        debug!(method = %method, url = %replay.url(), "Replaying request");
        let mut builder = self.client.request(method, replay.url()).headers(headers);
        if !replay.body().is_null() {
            builder = builder.json(replay.body());
        }
        let response = builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        if status.is_success() {
            let text = response.text().await?;
            let body = if text.trim().is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
            };
            return Ok(ProviderResponse::new(body, headers));
        }

        let text = response.text().await.unwrap_or_default();
        let message = if text.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            text
        };
        let mut error = ProviderError::with_status(status.as_u16(), message);
        if let Some(secs) = retry_after_secs(&headers) {
            error = error.retry_after(secs);
        }
        Err(error)
    }
}
