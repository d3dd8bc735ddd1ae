use crate::{RedditClient, RetryConfig, SearchQuery};
use infonet_core::{CoreError, RedditApiError, RedditConfig};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> RedditConfig {
    RedditConfig {
        client_id: "test_client_id".to_string(),
        client_secret: "test_client_secret".to_string(),
        api_base_url: server.uri(),
        token_url: format!("{}/api/v1/access_token", server.uri()),
        ..RedditConfig::default()
    }
}

fn fast_retries() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_factor: 0.0,
        ..RetryConfig::default()
    }
}

fn client(server: &MockServer) -> RedditClient {
    RedditClient::new(&test_config(server), 3)
        .unwrap()
        .with_retry_config(fast_retries())
}

fn query() -> SearchQuery {
    SearchQuery {
        query: "covid OR vaccine".to_string(),
        sort: "top".to_string(),
        time_filter: "year".to_string(),
        limit: 100,
    }
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "token-123",
        "token_type": "bearer",
        "expires_in": 86400,
        "scope": "read"
    })
}

fn search_body(ids: &[&str], after: Option<&str>) -> serde_json::Value {
    let children: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "kind": "t3",
                "data": {
                    "id": id,
                    "title": format!("Post {}", id),
                    "selftext": "vaccine data",
                    "author": "alice",
                    "subreddit": "science",
                    "permalink": format!("/r/science/comments/{}/", id),
                    "created_utc": 1640995200.0,
                    "score": 10,
                    "num_comments": 2
                }
            })
        })
        .collect();
    json!({ "kind": "Listing", "data": { "children": children, "after": after } })
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_authenticate_with_client_credentials() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    let client = client(&server);
    assert!(!client.is_authenticated().await);

    client.authenticate().await.unwrap();
    assert!(client.is_authenticated().await);
}

#[tokio::test]
async fn test_rejected_credentials_fail_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let result = client(&server).authenticate().await;
    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. }))
    ));
}

#[tokio::test]
async fn test_search_subreddit_sends_query_and_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/science/search"))
        .and(query_param("q", "covid OR vaccine"))
        .and(query_param("restrict_sr", "1"))
        .and(query_param("sort", "top"))
        .and(query_param("t", "year"))
        .and(query_param("limit", "25"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "598.0")
                .insert_header("x-ratelimit-reset", "120")
                .set_body_json(search_body(&["p1", "p2"], Some("t3_p2"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let listing = client
        .search_subreddit("science", &query(), 25, None)
        .await
        .unwrap();

    assert_eq!(listing.data.after.as_deref(), Some("t3_p2"));
    let posts = listing.into_items();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id, "p1");

    let metrics = client.get_metrics().await;
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.successful_requests, 1);

    let status = client.get_rate_limit_status().await;
    assert_eq!(status.server_remaining, Some(598));
}

#[tokio::test]
async fn test_forbidden_subreddit_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/private/search"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .search_subreddit("private", &query(), 100, None)
        .await;

    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::Forbidden { .. }))
    ));
}

#[tokio::test]
async fn test_missing_subreddit_maps_to_not_found() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/gone/search"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client(&server)
        .search_subreddit("gone", &query(), 100, None)
        .await;

    match result {
        Err(CoreError::RedditApi(RedditApiError::SubredditNotFound { subreddit })) => {
            assert_eq!(subreddit, "gone")
        }
        other => panic!("unexpected result: {:?}", other.map(|l| l.data.children.len())),
    }
}

#[tokio::test]
async fn test_deleted_thread_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/comments/gone1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch_comment_tree("gone1").await;

    match result {
        Err(CoreError::RedditApi(RedditApiError::NotFound { resource })) => {
            assert_eq!(resource, "/comments/gone1")
        }
        other => panic!("unexpected result: {:?}", other.map(|c| c.len())),
    }
    assert_eq!(client.get_retry_metrics().await.total_retries, 0);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/science/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/science/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["p1"], None)))
        .mount(&server)
        .await;

    let client = client(&server);
    let listing = client
        .search_subreddit("science", &query(), 100, None)
        .await
        .unwrap();

    assert_eq!(listing.data.children.len(), 1);
    let metrics = client.get_metrics().await;
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.failed_requests, 2);
    assert_eq!(client.get_retry_metrics().await.total_retries, 2);
}

#[tokio::test]
async fn test_rejected_token_triggers_reauthentication() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/r/science/search"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/science/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["p1"], None)))
        .mount(&server)
        .await;

    let listing = client(&server)
        .search_subreddit("science", &query(), 100, None)
        .await
        .unwrap();
    assert_eq!(listing.data.children.len(), 1);
}

#[tokio::test]
async fn test_fetch_comment_tree() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    let body = json!([
        search_body(&["p1"], None),
        {
            "kind": "Listing",
            "data": {
                "after": null,
                "children": [
                    {
                        "kind": "t1",
                        "data": {
                            "id": "c1",
                            "author": "bob",
                            "body": "source?",
                            "created_utc": 1640995300.0,
                            "parent_id": "t3_p1",
                            "link_id": "t3_p1",
                            "subreddit": "science",
                            "score": 4,
                            "permalink": "/r/science/comments/p1/_/c1/",
                            "replies": {
                                "kind": "Listing",
                                "data": {
                                    "after": null,
                                    "children": [
                                        {
                                            "kind": "t1",
                                            "data": {
                                                "id": "c2",
                                                "author": "alice",
                                                "body": "linked above",
                                                "created_utc": 1640995400.0,
                                                "parent_id": "t1_c1",
                                                "link_id": "t3_p1",
                                                "subreddit": "science",
                                                "score": 2,
                                                "permalink": "/r/science/comments/p1/_/c2/",
                                                "replies": ""
                                            }
                                        }
                                    ]
                                }
                            }
                        }
                    },
                    { "kind": "more", "data": { "count": 40, "children": ["c3", "c4"] } }
                ]
            }
        }
    ]);

    Mock::given(method("GET"))
        .and(path("/comments/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let comments = client(&server).fetch_comment_tree("p1").await.unwrap();

    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].parent_author.as_deref(), Some("alice"));
    assert_eq!(comments[1].author, "alice");
    assert_eq!(comments[1].parent_author.as_deref(), Some("bob"));
    assert_eq!(comments[1].depth, 1);
    assert_eq!(comments[1].submission_id, "p1");
}
