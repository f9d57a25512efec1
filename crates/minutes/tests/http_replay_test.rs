//! Tests for replaying queued requests over HTTP.

use minutes::{
    HttpReplayHandler, InMemoryRequestQueue, NewQueuedRequest, Provider, QueuedRequest,
    QuotaTracker, RateLimiter, ReplayHandler, ReplayRequest, RequestQueue, RetryConfig,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

fn queued(provider: Provider, request: &ReplayRequest) -> QueuedRequest {
    NewQueuedRequest::new(provider, request.to_payload().unwrap(), 0).into_queued(1)
}

#[tokio::test]
async fn test_openai_replay_sends_bearer_key_and_keeps_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_header("openai-beta", "assistants=v2")
        .match_body(Matcher::Json(json!({"model": "gpt-4o-mini"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-ratelimit-remaining-requests", "99")
        .with_body(r#"{"id": "chatcmpl-1"}"#)
        .create_async()
        .await;

    let request = ReplayRequest::post(
        format!("{}/v1/chat/completions", server.url()),
        json!({"model": "gpt-4o-mini"}),
    )
    .with_header("openai-beta", "assistants=v2");
    let handler = HttpReplayHandler::new().with_api_key(Provider::OpenAi, "sk-test");

    let response = handler
        .replay(&queued(Provider::OpenAi, &request))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.body, json!({"id": "chatcmpl-1"}));
    assert_eq!(
        response.headers.get("x-ratelimit-remaining-requests").unwrap(),
        "99"
    );
}

#[tokio::test]
async fn test_anthropic_rate_limit_carries_status_and_retry_after() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "ak-test")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(429)
        .with_header("retry-after", "7")
        .with_body("rate_limit_error")
        .create_async()
        .await;

    let request = ReplayRequest::post(format!("{}/v1/messages", server.url()), json!({}));
    let handler = HttpReplayHandler::new().with_api_key(Provider::Anthropic, "ak-test");

    let err = handler
        .replay(&queued(Provider::Anthropic, &request))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.status_code, Some(429));
    assert_eq!(err.retry_after_secs, Some(7.0));
    assert_eq!(err.message, "rate_limit_error");
}

#[tokio::test]
async fn test_unreplayable_payload_is_a_client_error() {
    let handler = HttpReplayHandler::new().with_api_key(Provider::OpenAi, "sk-test");
    let item = NewQueuedRequest::new(Provider::OpenAi, json!({"prompt": "hi"}), 0).into_queued(1);

    let err = handler.replay(&item).await.unwrap_err();
    assert_eq!(err.status_code, Some(400));
}

#[tokio::test]
async fn test_drain_replays_over_http_and_records_quota() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("POST", "/ok")
        .with_status(200)
        .with_header("x-ratelimit-limit-requests", "100")
        .with_header("x-ratelimit-remaining-requests", "80")
        .with_body("{}")
        .create_async()
        .await;
    let bad = server
        .mock("POST", "/bad")
        .with_status(400)
        .with_body("invalid model")
        .create_async()
        .await;

    let queue = Arc::new(InMemoryRequestQueue::default());
    let limiter = RateLimiter::new(
        RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        },
        QuotaTracker::new(),
        queue.clone(),
    )
    .unwrap();

    for path in ["/ok", "/bad"] {
        let request = ReplayRequest::post(format!("{}{}", server.url(), path), json!({}));
        queue
            .enqueue(NewQueuedRequest::new(
                Provider::OpenAi,
                request.to_payload().unwrap(),
                1,
            ))
            .await
            .unwrap();
    }

    let handler = HttpReplayHandler::new().with_api_key(Provider::OpenAi, "sk-test");
    let report = limiter.process_queue(10, &handler).await.unwrap();

    ok.assert_async().await;
    bad.assert_async().await;
    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.remaining, 0);

    let state = limiter.tracker().status(Provider::OpenAi).await;
    assert_eq!(state.requests_limit, Some(100));
    assert_eq!(state.requests_remaining, Some(80));
}
