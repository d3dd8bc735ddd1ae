use chrono::NaiveDate;
use collector::{Collector, DataStore};
use infonet_core::{AppConfig, Category, GroupConfig, RecordKind};
use reddit_client::{RedditClient, RetryConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JAN_2021: f64 = 1_610_000_000.0; // 2021-01-07
const JAN_2022: f64 = 1_641_500_000.0; // 2022-01-06

fn config(server: &MockServer, data_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::with_defaults();
    config.reddit.client_id = "id".to_string();
    config.reddit.client_secret = "secret".to_string();
    config.reddit.api_base_url = server.uri();
    config.reddit.token_url = format!("{}/api/v1/access_token", server.uri());
    config.collection.data_dir = data_dir.to_path_buf();
    config.collection.pause_between_subreddits_ms = 0;
    config.collection.limit = 10;
    config
}

fn client(config: &AppConfig) -> RedditClient {
    RedditClient::new(&config.reddit, config.collection.max_attempts)
        .unwrap()
        .with_retry_config(RetryConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_factor: 0.0,
            ..RetryConfig::default()
        })
}

fn post(id: &str, author: &str, subreddit: &str, created_utc: f64) -> serde_json::Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "title": format!("Vaccine thread {}", id),
            "selftext": "",
            "author": author,
            "subreddit": subreddit,
            "permalink": format!("/r/{}/comments/{}/", subreddit, id),
            "created_utc": created_utc,
            "score": 5,
            "num_comments": 2
        }
    })
}

fn comment(id: &str, author: &str, parent_id: &str, post_id: &str, replies: serde_json::Value) -> serde_json::Value {
    json!({
        "kind": "t1",
        "data": {
            "id": id,
            "author": author,
            "body": "reply",
            "created_utc": JAN_2021 + 60.0,
            "parent_id": parent_id,
            "link_id": format!("t3_{}", post_id),
            "subreddit": "Conspiracy",
            "score": 1,
            "permalink": "/r/Conspiracy/comments/x/",
            "replies": replies
        }
    })
}

fn listing(children: Vec<serde_json::Value>, after: Option<&str>) -> serde_json::Value {
    json!({ "kind": "Listing", "data": { "children": children, "after": after } })
}

async fn mount_common(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "read"
        })))
        .mount(server)
        .await;
}

async fn mount_search(server: &MockServer, subreddit: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/r/{}/search", subreddit)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_comments(server: &MockServer, post_id: &str, post_author: &str, comments: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/comments/{}", post_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            listing(vec![post(post_id, post_author, "Conspiracy", JAN_2021)], None),
            listing(comments, None)
        ])))
        .mount(server)
        .await;
}

fn misinformation_group(subreddits: &[&str]) -> GroupConfig {
    GroupConfig {
        category: Category::Misinformation,
        subreddits: subreddits.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_forbidden_subreddit_is_skipped_and_others_collected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_common(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/NoNewNormal/search"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    mount_search(
        &server,
        "Conspiracy",
        listing(vec![post("p1", "alice", "Conspiracy", JAN_2021)], None),
    )
    .await;
    mount_comments(
        &server,
        "p1",
        "alice",
        vec![comment(
            "c1",
            "bob",
            "t3_p1",
            "p1",
            listing(vec![comment("c2", "alice", "t1_c1", "p1", json!(""))], None),
        )],
    )
    .await;

    let config = config(&server, dir.path());
    let collector = Collector::new(client(&config), &config);
    let summary = collector
        .run(&misinformation_group(&["NoNewNormal", "Conspiracy"]))
        .await
        .unwrap();

    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].subreddit, "NoNewNormal");
    assert_eq!(summary.skipped[0].error_code, "REDDIT_FORBIDDEN");
    assert_eq!(summary.collected_subreddits(), 1);
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.unique_users, 2);
    assert_eq!(summary.edges, 2);

    let store = DataStore::new(dir.path());
    let records = store.load_group(Category::Misinformation).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| !r.author.is_empty() && !r.subreddit.is_empty()));
    assert!(store.subreddit_path(Category::Misinformation, "Conspiracy").exists());
    assert!(!store.subreddit_path(Category::Misinformation, "NoNewNormal").exists());
    assert_eq!(store.load_edges(Category::Misinformation).unwrap().len(), 2);
    assert!(store.summary_path(Category::Misinformation).exists());

    let reloaded = store.load_summary(Category::Misinformation).unwrap();
    assert_eq!(reloaded.run_id, summary.run_id);
    assert_eq!(reloaded.retries.total_retries, 0);
    assert!(reloaded.rate_limit.current_window_requests >= 3);
}

#[tokio::test]
async fn test_summary_records_retries_and_rate_limit_state() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_common(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/Conspiracy/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_search(
        &server,
        "Conspiracy",
        listing(vec![post("p1", "alice", "Conspiracy", JAN_2021)], None),
    )
    .await;
    mount_comments(&server, "p1", "alice", vec![]).await;

    let config = config(&server, dir.path());
    let collector = Collector::new(client(&config), &config);
    let summary = collector
        .run(&misinformation_group(&["Conspiracy"]))
        .await
        .unwrap();

    assert!(summary.skipped.is_empty());
    assert_eq!(summary.retries.total_retries, 1);
    assert_eq!(summary.retries.successful_retries, 1);
    assert_eq!(summary.rate_limit.current_window_requests, 3);
    assert_eq!(
        summary.rate_limit.requests_remaining_in_window(),
        summary.rate_limit.requests_per_minute - 3
    );
    assert!(summary.throttle_line().starts_with("1 retries (1 recovered"));

    let reloaded = DataStore::new(dir.path())
        .load_summary(Category::Misinformation)
        .unwrap();
    assert_eq!(reloaded.retries, summary.retries);
}

#[tokio::test]
async fn test_records_outside_date_window_are_not_collected() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_common(&server).await;

    mount_search(
        &server,
        "Conspiracy",
        listing(
            vec![
                post("p1", "alice", "Conspiracy", JAN_2021),
                post("p2", "carol", "Conspiracy", JAN_2022),
            ],
            None,
        ),
    )
    .await;
    mount_comments(&server, "p1", "alice", vec![comment("c1", "bob", "t3_p1", "p1", json!(""))]).await;

    Mock::given(method("GET"))
        .and(path("/comments/p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config(&server, dir.path());
    config.collection.start_date = NaiveDate::from_ymd_opt(2021, 1, 1);
    config.collection.end_date = NaiveDate::from_ymd_opt(2022, 1, 1);

    let collector = Collector::new(client(&config), &config);
    let collection = collector
        .collect_group(&misinformation_group(&["Conspiracy"]))
        .await
        .unwrap();

    let ids: Vec<&str> = collection.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "c1"]);
    assert_eq!(collection.subreddits[0].filtered_out, 1);
    assert_eq!(collection.records[1].kind, RecordKind::Comment);
    assert_eq!(collection.records[1].parent_author.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_pagination_follows_after_cursor() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_common(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/Conspiracy/search"))
        .and(wiremock::matchers::query_param("after", "t3_p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(
            vec![post("p2", "carol", "Conspiracy", JAN_2021)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_search(
        &server,
        "Conspiracy",
        listing(vec![post("p1", "alice", "Conspiracy", JAN_2021)], Some("t3_p1")),
    )
    .await;
    mount_comments(&server, "p1", "alice", vec![]).await;
    mount_comments(&server, "p2", "carol", vec![]).await;

    let config = config(&server, dir.path());
    let collector = Collector::new(client(&config), &config);
    let collection = collector
        .collect_group(&misinformation_group(&["Conspiracy"]))
        .await
        .unwrap();

    assert_eq!(collection.subreddits[0].submissions, 2);
}

#[tokio::test]
async fn test_rejected_credentials_abort_the_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let config = config(&server, dir.path());
    let collector = Collector::new(client(&config), &config);
    let result = collector
        .run(&misinformation_group(&["Conspiracy", "DebateVaccines"]))
        .await;

    assert!(result.is_err());
    assert!(!DataStore::new(dir.path())
        .content_path(Category::Misinformation)
        .exists());
}
