// tests/feed_client_http.rs
//
// Feed client behavior against a mock HTTP server: pagination parameters,
// error taxonomy, retry accounting and budget consumption.

use chrono::{NaiveTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

use news_digest::budget::RequestBudget;
use news_digest::ingest::feed_client::{FeedClient, FeedClientCfg, FeedSource};
use news_digest::ingest::types::{FeedError, PageFetch};

fn client_for(server: &mockito::ServerGuard, max_attempts: u32) -> FeedClient {
    FeedClient::new(FeedClientCfg {
        base_url: server.url(),
        stream_id: "user/abc/category/news".into(),
        token: "test-token".into(),
        page_size: 2,
        backoff_base: Duration::from_millis(10),
        backoff_max_delay: Duration::from_millis(40),
        backoff_max_attempts: max_attempts,
    })
}

fn budget(limit: u32) -> RequestBudget {
    RequestBudget::new(
        limit,
        NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        Utc::now(),
    )
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(30)
}

const PAGE_JSON: &str = r#"{
  "items": [
    {
      "originId": "https://example.test/a",
      "title": "Acme raises a round",
      "summary": {"content": "Series A for last mile logistics."},
      "published": 1700000000000,
      "origin": {"title": "Example Wire"}
    },
    {
      "originId": "https://example.test/b",
      "title": "Weather",
      "published": 1700000100000
    }
  ],
  "continuation": "cursor-2"
}"#;

#[tokio::test]
async fn fetches_a_page_and_returns_cursor() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("streamId".into(), "user/abc/category/news".into()),
            mockito::Matcher::UrlEncoded("count".into(), "2".into()),
            mockito::Matcher::UrlEncoded("ranked".into(), "newest".into()),
        ]))
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PAGE_JSON)
        .create_async()
        .await;

    let client = client_for(&server, 3);
    let mut budget = budget(10);

    let page = client
        .fetch_page(None, &mut budget, far_deadline())
        .await
        .expect("fetch should succeed");

    match page {
        PageFetch::Batch(batch) => {
            assert_eq!(batch.items.len(), 2);
            assert_eq!(batch.continuation.as_deref(), Some("cursor-2"));
        }
        other => panic!("expected Batch, got {other:?}"),
    }
    assert_eq!(budget.consumed(), 1);
    m.assert_async().await;
}

#[tokio::test]
async fn passes_the_continuation_cursor_through() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::UrlEncoded(
            "continuation".into(),
            "cursor-2".into(),
        ))
        .with_status(200)
        .with_body(r#"{"items": []}"#)
        .create_async()
        .await;

    let client = client_for(&server, 3);
    let mut budget = budget(10);

    let page = client
        .fetch_page(Some("cursor-2"), &mut budget, far_deadline())
        .await
        .expect("fetch should succeed");
    match page {
        PageFetch::Batch(batch) => {
            assert!(batch.items.is_empty());
            assert!(batch.continuation.is_none());
        }
        other => panic!("expected Batch, got {other:?}"),
    }
    m.assert_async().await;
}

#[tokio::test]
async fn auth_failure_is_fatal_and_never_retried() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::Any)
        .with_status(401)
        .with_body("bad token")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 5);
    let mut budget = budget(10);

    let err = client
        .fetch_page(None, &mut budget, far_deadline())
        .await
        .expect_err("401 must be fatal");
    match err {
        FeedError::Fatal { status, .. } => assert_eq!(status, 401),
        other => panic!("expected Fatal, got {other:?}"),
    }
    // Exactly one attempt, one budget unit.
    assert_eq!(budget.consumed(), 1);
    m.assert_async().await;
}

#[tokio::test]
async fn server_errors_retry_then_escalate() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::Any)
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server, 2);
    let mut budget = budget(10);

    let err = client
        .fetch_page(None, &mut budget, far_deadline())
        .await
        .expect_err("exhausted retries must escalate");
    match err {
        FeedError::TransientExhausted { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected TransientExhausted, got {other:?}"),
    }
    // Initial try + 2 retries, each consuming budget.
    assert_eq!(budget.consumed(), 3);
    m.assert_async().await;
}

#[tokio::test]
async fn persistent_throttling_surfaces_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::Any)
        .with_status(429)
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server, 2);
    let mut budget = budget(10);

    let page = client
        .fetch_page(None, &mut budget, far_deadline())
        .await
        .expect("throttling is not an error");
    match page {
        PageFetch::RateLimited { retry_after } => {
            // No Retry-After from the remote: fall back to the backoff cap.
            assert_eq!(retry_after, Duration::from_millis(40));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert_eq!(budget.consumed(), 3);
    m.assert_async().await;
}

#[tokio::test]
async fn remote_retry_after_hint_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "7")
        .expect(1)
        .create_async()
        .await;

    // Zero retry attempts: the first 429 terminates with the remote hint.
    let client = client_for(&server, 0);
    let mut budget = budget(10);

    let page = client
        .fetch_page(None, &mut budget, far_deadline())
        .await
        .expect("throttling is not an error");
    match page {
        PageFetch::RateLimited { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(7));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    m.assert_async().await;
}

#[tokio::test]
async fn deadline_cuts_a_backoff_wait_short() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::Any)
        .with_status(429)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, 5);
    let mut budget = budget(10);

    // Deadline expires before the first 10ms backoff wait finishes.
    let deadline = Instant::now() + Duration::from_millis(5);
    let page = client
        .fetch_page(None, &mut budget, deadline)
        .await
        .expect("deadline expiry is not an error");
    assert!(matches!(page, PageFetch::DeadlineExceeded));
    m.assert_async().await;
}

#[tokio::test]
async fn exhausted_budget_issues_no_request() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/streams/contents")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"items": []}"#)
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server, 3);
    let mut budget = budget(0);

    let page = client
        .fetch_page(None, &mut budget, far_deadline())
        .await
        .expect("blocked budget is not an error");
    assert!(matches!(page, PageFetch::RateLimited { .. }));
    m.assert_async().await;
}
