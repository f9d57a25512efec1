//! Tests for the SQLite request queue and quota store.

use chrono::{Duration as ChronoDuration, Utc};
use minutes_core::{NewQueuedRequest, Provider, QuotaChange, QuotaState, QuotaUpdate};
use minutes_database::{QueueDatabase, SqliteQuotaStore, SqliteRequestQueue, resolve_database_url};
use minutes_error::QueueErrorKind;
use minutes_interface::{QuotaStore, RequestQueue};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

async fn open(dir: &TempDir) -> QueueDatabase {
    let path = dir.path().join("queue.db");
    QueueDatabase::open(path.to_str().unwrap()).await.unwrap()
}

fn request(provider: Provider, n: i64) -> NewQueuedRequest {
    NewQueuedRequest::new(provider, json!({"n": n}), 1)
}

#[tokio::test]
async fn test_enqueue_assigns_increasing_sequences() {
    let dir = TempDir::new().unwrap();
    let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::from_secs(300));

    let first = queue.enqueue(request(Provider::OpenAi, 0)).await.unwrap();
    let second = queue.enqueue(request(Provider::Anthropic, 1)).await.unwrap();

    assert!(second.sequence() > first.sequence());
    assert_eq!(*first.payload(), json!({"n": 0}));
    assert_eq!(*first.attempt_count(), 1);
    assert!(first.claimed_at().is_none());
    assert_eq!(queue.size(None).await.unwrap(), 2);
    assert_eq!(queue.size(Some(Provider::Anthropic)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_claim_is_fifo_per_provider_and_exclusive() {
    let dir = TempDir::new().unwrap();
    let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::from_secs(300));
    for n in 0..3 {
        queue.enqueue(request(Provider::OpenAi, n)).await.unwrap();
    }
    queue.enqueue(request(Provider::Anthropic, 9)).await.unwrap();

    let providers = [Provider::OpenAi];
    let a = queue.claim_next(&providers).await.unwrap().unwrap();
    let b = queue.claim_next(&providers).await.unwrap().unwrap();
    assert_eq!(*a.payload(), json!({"n": 0}));
    assert_eq!(*b.payload(), json!({"n": 1}));
    assert!(a.claimed_at().is_some());

    queue.release(&a, 3).await.unwrap();
    let again = queue.claim_next(&providers).await.unwrap().unwrap();
    assert_eq!(again.id(), a.id());
    assert_eq!(again.sequence(), a.sequence());
    assert_eq!(*again.attempt_count(), 3);

    let c = queue.claim_next(&providers).await.unwrap().unwrap();
    assert_eq!(*c.payload(), json!({"n": 2}));
    assert!(queue.claim_next(&providers).await.unwrap().is_none());

    let other = queue
        .claim_next(&[Provider::Anthropic])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*other.payload(), json!({"n": 9}));
}

#[tokio::test]
async fn test_claim_with_no_providers_returns_nothing() {
    let dir = TempDir::new().unwrap();
    let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::from_secs(300));
    queue.enqueue(request(Provider::OpenAi, 0)).await.unwrap();
    assert!(queue.claim_next(&[]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_claims_are_delivered_again() {
    let dir = TempDir::new().unwrap();
    let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::ZERO);
    queue.enqueue(request(Provider::Anthropic, 0)).await.unwrap();

    let first = queue
        .claim_next(&[Provider::Anthropic])
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = queue
        .claim_next(&[Provider::Anthropic])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id(), second.id());
}

#[tokio::test]
async fn test_complete_removes_and_unknown_ids_are_not_found() {
    let dir = TempDir::new().unwrap();
    let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::from_secs(300));
    queue.enqueue(request(Provider::OpenAi, 0)).await.unwrap();
    let claimed = queue.claim_next(&[Provider::OpenAi]).await.unwrap().unwrap();

    queue.complete(&claimed).await.unwrap();
    assert_eq!(queue.size(None).await.unwrap(), 0);

    let err = queue.complete(&claimed).await.unwrap_err();
    assert!(matches!(err.kind, QueueErrorKind::NotFound(_)));
    let err = queue.release(&claimed, 1).await.unwrap_err();
    assert!(matches!(err.kind, QueueErrorKind::NotFound(_)));
}

#[tokio::test]
async fn test_lease_taken_over_by_another_handle_cannot_settle() {
    let dir = TempDir::new().unwrap();
    let lease = Duration::from_millis(200);
    let first = SqliteRequestQueue::new(open(&dir).await, 100, lease);
    let second = SqliteRequestQueue::new(open(&dir).await, 100, lease);
    first.enqueue(request(Provider::OpenAi, 0)).await.unwrap();
    let providers = [Provider::OpenAi];

    let stale = first.claim_next(&providers).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let current = second.claim_next(&providers).await.unwrap().unwrap();
    assert_eq!(stale.id(), current.id());

    let err = first.complete(&stale).await.unwrap_err();
    assert!(matches!(err.kind, QueueErrorKind::LeaseLost(_)));
    let err = first.renew(&stale).await.unwrap_err();
    assert!(matches!(err.kind, QueueErrorKind::LeaseLost(_)));
    assert_eq!(first.size(None).await.unwrap(), 1);

    second.complete(&current).await.unwrap();
    assert_eq!(first.size(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_renewed_lease_blocks_other_handles() {
    let dir = TempDir::new().unwrap();
    let lease = Duration::from_millis(300);
    let first = SqliteRequestQueue::new(open(&dir).await, 100, lease);
    let second = SqliteRequestQueue::new(open(&dir).await, 100, lease);
    first.enqueue(request(Provider::Anthropic, 0)).await.unwrap();
    let providers = [Provider::Anthropic];

    let claimed = first.claim_next(&providers).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let renewed = first.renew(&claimed).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Past the first lease, inside the renewed one.
    assert!(second.claim_next(&providers).await.unwrap().is_none());
    first.release(&renewed, 2).await.unwrap();

    let again = second.claim_next(&providers).await.unwrap().unwrap();
    assert_eq!(again.id(), claimed.id());
    assert_eq!(*again.attempt_count(), 2);
}

#[tokio::test]
async fn test_concurrent_claims_never_share_an_item() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let queue = SqliteRequestQueue::new(db.clone(), 100, Duration::from_secs(300));
    for n in 0..6 {
        queue.enqueue(request(Provider::OpenAi, n)).await.unwrap();
    }

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let queue = SqliteRequestQueue::new(db.clone(), 100, Duration::from_secs(300));
        tasks.spawn(async move { queue.claim_next(&[Provider::OpenAi]).await.unwrap() });
    }

    let mut claimed: Vec<i64> = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Some(item) = result.unwrap() {
            claimed.push(*item.sequence());
        }
    }
    claimed.sort_unstable();
    let before = claimed.len();
    claimed.dedup();
    assert_eq!(before, 6);
    assert_eq!(claimed.len(), 6);
}

#[tokio::test]
async fn test_enqueue_fails_when_full() {
    let dir = TempDir::new().unwrap();
    let queue = SqliteRequestQueue::new(open(&dir).await, 2, Duration::from_secs(300));
    queue.enqueue(request(Provider::OpenAi, 0)).await.unwrap();
    queue.enqueue(request(Provider::OpenAi, 1)).await.unwrap();

    let err = queue
        .enqueue(request(Provider::OpenAi, 2))
        .await
        .unwrap_err();
    assert_eq!(err.kind, QueueErrorKind::Full(2));
    assert_eq!(queue.size(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_list_and_clear_by_provider() {
    let dir = TempDir::new().unwrap();
    let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::from_secs(300));
    for n in 0..3 {
        queue.enqueue(request(Provider::OpenAi, n)).await.unwrap();
        queue.enqueue(request(Provider::Anthropic, n)).await.unwrap();
    }

    let listed = queue.list(Some(Provider::OpenAi), 2).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|r| *r.provider() == Provider::OpenAi));
    assert!(listed[0].sequence() < listed[1].sequence());

    assert_eq!(queue.clear(Some(Provider::Anthropic)).await.unwrap(), 3);
    assert_eq!(queue.size(None).await.unwrap(), 3);
    assert_eq!(queue.clear(None).await.unwrap(), 3);
    assert_eq!(queue.size(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_requests_survive_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let id = {
        let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::from_secs(300));
        *queue
            .enqueue(request(Provider::Anthropic, 7))
            .await
            .unwrap()
            .id()
    };

    let queue = SqliteRequestQueue::new(open(&dir).await, 100, Duration::from_secs(300));
    let listed = queue.list(None, 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(*listed[0].id(), id);
    assert_eq!(*listed[0].payload(), json!({"n": 7}));
}

#[tokio::test]
async fn test_quota_store_upserts_last_write() {
    let dir = TempDir::new().unwrap();
    let store = SqliteQuotaStore::new(open(&dir).await);
    let now = Utc::now();

    let mut state = QuotaState {
        requests_limit: Some(500),
        requests_remaining: Some(400),
        ..QuotaState::default()
    };
    store.save(Provider::OpenAi, &state).await.unwrap();

    state.requests_remaining = Some(10);
    state.backoff_until = Some(now + ChronoDuration::seconds(60));
    state.updated_at = Some(now);
    store.save(Provider::OpenAi, &state).await.unwrap();

    let loaded = store.load_all().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(*loaded[0].provider(), Provider::OpenAi);
    assert_eq!(*loaded[0].state(), state);
}

#[tokio::test]
async fn test_quota_store_is_shared_across_handles() {
    let dir = TempDir::new().unwrap();
    let writer = SqliteQuotaStore::new(open(&dir).await);
    let reader = SqliteQuotaStore::new(open(&dir).await);

    let state = QuotaState {
        tokens_remaining: Some(42),
        ..QuotaState::default()
    };
    writer.save(Provider::Anthropic, &state).await.unwrap();

    let loaded = reader.load_all().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].state().tokens_remaining, Some(42));
}

#[tokio::test]
async fn test_quota_changes_merge_per_field_across_handles() {
    let dir = TempDir::new().unwrap();
    let first = SqliteQuotaStore::new(open(&dir).await);
    let second = SqliteQuotaStore::new(open(&dir).await);
    let now = Utc::now();

    first
        .apply(Provider::OpenAi, &QuotaChange::SetBackoff(now + ChronoDuration::seconds(60)))
        .await
        .unwrap();
    let headers = QuotaUpdate {
        requests_limit: Some(500),
        requests_remaining: Some(12),
        ..QuotaUpdate::default()
    };
    second
        .apply(Provider::OpenAi, &QuotaChange::Headers(headers))
        .await
        .unwrap();
    second
        .apply(Provider::OpenAi, &QuotaChange::ClearBackoff)
        .await
        .unwrap();

    // The first handle never saw the clear or the headers.
    let merged = first
        .apply(Provider::OpenAi, &QuotaChange::Request(now))
        .await
        .unwrap();
    assert_eq!(merged.backoff_until, None);
    assert_eq!(merged.requests_remaining, Some(12));
    assert_eq!(merged.requests_limit, Some(500));
    assert_eq!(merged.recent_requests, vec![now]);

    let loaded = second.load_all().await.unwrap();
    assert_eq!(*loaded[0].state(), merged);
}

#[test]
fn test_resolve_strips_sqlite_scheme() {
    if std::env::var("DATABASE_URL").is_err() {
        assert_eq!(resolve_database_url("sqlite://queue.db"), "queue.db");
        assert_eq!(resolve_database_url("sqlite:queue.db"), "queue.db");
        assert_eq!(resolve_database_url("queue.db"), "queue.db");
    }
}
