//! End-to-end harvest tests
//!
//! These tests use wiremock to stand in for the remote API and run the full
//! resolve, enumerate, details and comments cycle into a temporary database.

use quota_harvester::config::{parse_config, Config};
use quota_harvester::harvest::{run_harvest, ResolveStrategy, StopSignal};
use quota_harvester::sink::{RunLog, RunStatus, SqliteRunLog};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const CHANNEL_ID: &str = "UCabcdefghijklmnopqrstuv";

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &Path) -> Config {
    parse_config(&format!(
        r#"
[api]
base-url = "{}/youtube/v3"

[retry]
base-delay-ms = 5
max-delay-ms = 20
max-attempts = 3

[[keys]]
label = "primary"
token = "tok-primary"

[[keys]]
label = "backup"
token = "tok-backup"

[harvest]
resource = "somebody"

[output]
database-path = "{}"
"#,
        base_url,
        db_path.display()
    ))
    .expect("Failed to parse test config")
}

/// Mounts a channel with three uploads spread over two listing pages
///
/// v1 has one comment, v2 has comments disabled, v3 reports zero comments.
async fn mount_channel(server: &MockServer) {
    // Handle lookup misses, user name lookup hits
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .and(query_param("forHandle", "somebody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "youtube#channelListResponse",
            "pageInfo": {"totalResults": 0, "resultsPerPage": 5}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .and(query_param("forUsername", "somebody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": CHANNEL_ID,
                "snippet": {"title": "Somebody"},
                "contentDetails": {"relatedPlaylists": {"uploads": "UUabcdefghijklmnopqrstuv"}}
            }]
        })))
        .mount(server)
        .await;

    // Second page first, so it wins over the catch-all first page
    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"contentDetails": {"videoId": "v3"}}]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("playlistId", "UUabcdefghijklmnopqrstuv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"contentDetails": {"videoId": "v1"}},
                {"contentDetails": {"videoId": "v2"}}
            ],
            "nextPageToken": "page-2"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "v1", "statistics": {"commentCount": "1"}},
                {"id": "v2", "statistics": {"commentCount": "3"}},
                {"id": "v3", "statistics": {"commentCount": "0"}}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", "v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "thread-1", "snippet": {"videoId": "v1"}}]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", "v2"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "The video has disabled comments.",
                "errors": [{"reason": "commentsDisabled"}]
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/commentThreads"))
        .and(query_param("videoId", "v3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(0)
        .mount(server)
        .await;
}

fn requests_to(requests: &[Request], endpoint: &str) -> Vec<String> {
    requests
        .iter()
        .filter(|r| r.url.path().ends_with(endpoint))
        .map(|r| r.url.query().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_full_harvest() {
    let server = MockServer::start().await;
    mount_channel(&server).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(&server.uri(), &db_path);

    let summary = run_harvest(&config, "test-hash", StopSignal::new())
        .await
        .expect("Harvest failed");

    assert_eq!(summary.channel_id.as_deref(), Some(CHANNEL_ID));
    assert_eq!(summary.strategy, Some(ResolveStrategy::Username));
    assert_eq!(summary.children, 3);
    assert_eq!(summary.details_written, 3);
    assert_eq!((summary.has_data, summary.empty, summary.ambiguous), (2, 1, 0));
    assert_eq!(summary.comments_collected, 1);
    assert_eq!(summary.comment_rows, 1);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].identifier, "v2");
    assert_eq!(summary.skipped[0].reason, "commentsDisabled");
    assert!(!summary.interrupted);

    let log = SqliteRunLog::open(&db_path).expect("Failed to open database");
    assert_eq!(log.count_records("channels").unwrap(), 1);
    assert_eq!(log.count_records("videos").unwrap(), 3);
    assert_eq!(log.count_records("comments").unwrap(), 1);

    let run = log.get_latest_run().unwrap().expect("Run not recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.resource, "somebody");
    assert_eq!(log.get_skips(run.id).unwrap().len(), 1);

    // Every request carried one of the configured keys
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.query_pairs().any(|(k, v)| k == "key" && v == "tok-primary")));
}

#[tokio::test]
async fn test_resumed_harvest_skips_completed_work() {
    let server = MockServer::start().await;
    mount_channel(&server).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(&server.uri(), &db_path);

    run_harvest(&config, "test-hash", StopSignal::new())
        .await
        .expect("First harvest failed");
    let first_run = server.received_requests().await.unwrap().len();

    let summary = run_harvest(&config, "test-hash", StopSignal::new())
        .await
        .expect("Second harvest failed");

    let requests = server.received_requests().await.unwrap();
    let second_run = &requests[first_run..];

    assert!(requests_to(second_run, "/videos").is_empty());
    let comment_calls = requests_to(second_run, "/commentThreads");
    assert_eq!(comment_calls.len(), 1);
    assert!(comment_calls[0].contains("videoId=v2"));

    assert_eq!(summary.details_reused, 3);
    assert_eq!(summary.already_done, 1);
    assert_eq!(summary.comments_collected, 0);

    let log = SqliteRunLog::open(&db_path).unwrap();
    assert_eq!(log.count_records("videos").unwrap(), 3);
    assert_eq!(log.count_records("comments").unwrap(), 1);
}

#[tokio::test]
async fn test_quota_on_primary_moves_to_backup() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("key", "tok-primary"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "errors": [{"reason": "quotaExceeded"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_channel(&server).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(&server.uri(), &db_path);

    let summary = run_harvest(&config, "test-hash", StopSignal::new())
        .await
        .expect("Harvest failed");

    assert_eq!(summary.stats.rotations, 1);
    assert_eq!(summary.comments_collected, 1);
}

#[tokio::test]
async fn test_unknown_resource_exits_with_not_found() {
    let server = MockServer::start().await;
    mount_channel(&server).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("harvest.db");
    let mut config = create_test_config(&server.uri(), &db_path);
    config.harvest.resource = "@ghost".to_string();

    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .and(query_param("forHandle", "@ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let err = run_harvest(&config, "test-hash", StopSignal::new())
        .await
        .expect_err("Harvest should fail");
    assert_eq!(err.exit_code(), 3);

    let log = SqliteRunLog::open(&db_path).unwrap();
    let run = log.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}
