//! Replaying queued requests against providers.

use async_trait::async_trait;
use minutes_core::QueuedRequest;
use minutes_error::ProviderError;
use reqwest::header::HeaderMap;

/// A successful provider response together with its headers.
///
/// Headers are kept so the quota tracker can read the provider's rate-limit
/// counters from them.
#[derive(Debug, Clone)]
pub struct ProviderResponse<T> {
    /// Decoded response body
    pub body: T,
    /// Raw response headers
    pub headers: HeaderMap,
}

impl<T> ProviderResponse<T> {
    /// Create a response with headers.
    pub fn new(body: T, headers: HeaderMap) -> Self {
        Self { body, headers }
    }

    /// Create a response without headers (SDK calls that hide them).
    pub fn without_headers(body: T) -> Self {
        Self {
            body,
            headers: HeaderMap::new(),
        }
    }

    /// Transform the body, keeping the headers.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProviderResponse<U> {
        ProviderResponse {
            body: f(self.body),
            headers: self.headers,
        }
    }
}

/// Turns a queued payload back into a provider call.
///
/// The background drain hands each leased request to a handler. Errors are
/// classified exactly like errors from the original foreground call.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    /// Re-issue the call described by `request`.
    async fn replay(
        &self,
        request: &QueuedRequest,
    ) -> Result<ProviderResponse<serde_json::Value>, ProviderError>;
}
