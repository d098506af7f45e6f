//! Executor tests against a mock HTTP API
//!
//! These cover key rotation, transient retries and failure classification
//! over real HTTP responses.

use quota_harvester::client::{BackoffPolicy, DataSource, Executor, HttpSource};
use quota_harvester::keys::{Credential, KeyPool};
use quota_harvester::{HarvestError, Operation, RejectKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> BackoffPolicy {
    BackoffPolicy {
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        max_attempts: 3,
        jitter: 0.0,
    }
}

fn executor(server: &MockServer, labels: &[&str]) -> Executor {
    let source = HttpSource::new(reqwest::Client::new(), &server.uri(), "key")
        .expect("Failed to build source");
    let source: Arc<dyn DataSource> = Arc::new(source);
    let credentials = labels
        .iter()
        .map(|label| Credential::new(*label, format!("tok-{}", label)))
        .collect();
    Executor::new(KeyPool::new(credentials), source, fast_policy())
}

fn api_error(code: u16, reason: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(json!({
        "error": {
            "code": code,
            "message": "request failed",
            "errors": [{ "reason": reason }]
        }
    }))
}

#[tokio::test]
async fn test_quota_error_rotates_to_next_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("key", "tok-a"))
        .respond_with(api_error(403, "quotaExceeded"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("key", "tok-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(2)
        .mount(&server)
        .await;

    let mut executor = executor(&server, &["a", "b"]);
    let operation = Operation::new("videos").param("id", "v1");

    let first = executor.execute(&operation).await.unwrap();
    assert_eq!(first, json!({"items": []}));
    assert_eq!(executor.active_label(), Some("b"));

    // Key a stays benched for the rest of the run
    executor.execute(&operation).await.unwrap();
    assert_eq!(executor.stats().rotations, 1);
    assert_eq!(executor.pool().available_count(), 1);
}

#[tokio::test]
async fn test_every_key_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3600"))
        .expect(2)
        .mount(&server)
        .await;

    let mut executor = executor(&server, &["a", "b"]);
    let result = executor.execute(&Operation::new("videos")).await;

    assert!(matches!(result, Err(HarvestError::QuotaExhausted { keys: 2 })));
    assert!(!executor.pool().has_available());
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/commentThreads"))
        .respond_with(api_error(503, "backendError"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/commentThreads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "c1"}]})))
        .mount(&server)
        .await;

    let mut executor = executor(&server, &["a"]);
    let value = executor
        .execute(&Operation::new("commentThreads").param("videoId", "v1"))
        .await
        .unwrap();

    assert_eq!(value["items"][0]["id"], "c1");
    assert_eq!(executor.stats().retries, 1);
    assert_eq!(executor.stats().calls, 2);
    assert_eq!(executor.stats().rotations, 0);
}

#[tokio::test]
async fn test_transient_retries_are_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut executor = executor(&server, &["a", "b"]);
    let result = executor.execute(&Operation::new("videos")).await;

    match result {
        Err(HarvestError::RequestFailed { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("unexpected result: {:?}", other),
    }
    // Transient failures never rotate keys
    assert_eq!(executor.stats().rotations, 0);
}

#[tokio::test]
async fn test_rejections_fail_fast() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/commentThreads"))
        .respond_with(api_error(403, "commentsDisabled"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .respond_with(api_error(404, "playlistNotFound"))
        .expect(1)
        .mount(&server)
        .await;

    let mut executor = executor(&server, &["a", "b"]);

    match executor.execute(&Operation::new("commentThreads")).await {
        Err(HarvestError::Rejected { kind, reason, .. }) => {
            assert_eq!(kind, RejectKind::Denied);
            assert_eq!(reason, "commentsDisabled");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    match executor.execute(&Operation::new("playlistItems")).await {
        Err(HarvestError::Rejected { kind, .. }) => assert_eq!(kind, RejectKind::NotFound),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mut executor = executor(&server, &["a"]);
    let result = executor.execute(&Operation::new("videos")).await;

    assert!(matches!(result, Err(HarvestError::MalformedResponse { .. })));
}
