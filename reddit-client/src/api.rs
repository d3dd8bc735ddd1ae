use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use chrono::{DateTime, Utc};
use infonet_core::{
    is_known_author, Category, CoreError, RedditApiError, RedditConfig, Record, RecordKind,
};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

/// Reddit returns at most this many listing entries per request.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

impl<T> RedditListing<T> {
    pub fn into_items(self) -> Vec<T> {
        self.data.children.into_iter().map(|child| child.data).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub url: String,
}

impl RedditPostData {
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp(self.created_utc)
    }

    pub fn to_record(&self, category: Category) -> Record {
        Record {
            id: self.id.clone(),
            kind: RecordKind::Submission,
            author: self.author.clone(),
            created_utc: self.created_at(),
            parent_id: None,
            parent_author: None,
            submission_id: self.id.clone(),
            subreddit: self.subreddit.clone(),
            category,
            title: Some(self.title.clone()),
            body: self.selftext.clone(),
            score: self.score,
            permalink: self.permalink.clone(),
            depth: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentListing {
    pub kind: String,
    pub data: CommentListingData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentListingData {
    pub children: Vec<CommentThing>,
    #[serde(default)]
    pub after: Option<String>,
}

/// Entries of a comment listing: real comments and "load more" stubs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum CommentThing {
    #[serde(rename = "t1")]
    Comment(Box<RedditCommentData>),
    #[serde(rename = "more")]
    More(MoreComments),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoreComments {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub children: Vec<String>,
}

/// Reddit sends `""` instead of a listing when a comment has no replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Replies {
    Listing(CommentListing),
    Empty(String),
}

impl Default for Replies {
    fn default() -> Self {
        Replies::Empty(String::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    pub created_utc: f64,
    pub parent_id: String,
    pub link_id: String,
    pub subreddit: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub replies: Replies,
}

/// A comment lifted out of the reply tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatComment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_utc: DateTime<Utc>,
    pub parent_id: String,
    pub parent_author: Option<String>,
    pub submission_id: String,
    pub subreddit: String,
    pub score: i64,
    pub permalink: String,
    pub depth: u32,
}

impl FlatComment {
    pub fn into_record(self, category: Category) -> Record {
        Record {
            id: self.id,
            kind: RecordKind::Comment,
            author: self.author,
            created_utc: self.created_utc,
            parent_id: Some(self.parent_id),
            parent_author: self.parent_author,
            submission_id: self.submission_id,
            subreddit: self.subreddit,
            category,
            title: None,
            body: self.body,
            score: self.score,
            permalink: self.permalink,
            depth: self.depth,
        }
    }
}

/// Walk the reply tree depth-first. "Load more" stubs are not expanded.
///
/// Comments without a known author are not emitted, but their replies are, with
/// no parent author.
pub fn flatten_comment_tree(children: Vec<CommentThing>, post_author: Option<&str>) -> Vec<FlatComment> {
    let mut flat = Vec::new();
    walk_comments(children, post_author, 0, &mut flat);
    flat
}

fn walk_comments(
    children: Vec<CommentThing>,
    parent_author: Option<&str>,
    depth: u32,
    out: &mut Vec<FlatComment>,
) {
    for child in children {
        let CommentThing::Comment(comment) = child else {
            continue;
        };
        let comment = *comment;
        let known = is_known_author(&comment.author).then(|| comment.author.clone());

        if let Some(author) = &known {
            out.push(FlatComment {
                id: comment.id.clone(),
                author: author.clone(),
                body: comment.body.clone(),
                created_utc: timestamp(comment.created_utc),
                parent_id: comment.parent_id.clone(),
                parent_author: parent_author.map(str::to_string),
                submission_id: comment
                    .link_id
                    .strip_prefix("t3_")
                    .unwrap_or(&comment.link_id)
                    .to_string(),
                subreddit: comment.subreddit.clone(),
                score: comment.score,
                permalink: comment.permalink.clone(),
                depth,
            });
        }

        if let Replies::Listing(replies) = comment.replies {
            walk_comments(replies.data.children, known.as_deref(), depth + 1, out);
        }
    }
}

fn timestamp(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or_default()
}

/// Search parameters shared by every page of one subreddit search.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub sort: String,
    pub time_filter: String,
    /// Upper bound on submissions taken from one subreddit, across pages.
    pub limit: u32,
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: Url,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(config: &RedditConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Self::with_http_client(config, http_client)
    }

    pub fn with_http_client(config: &RedditConfig, http_client: Client) -> Result<Self, CoreError> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid api base url '{}': {}", config.api_base_url, e),
        })?;
        let rate_config = RateLimitConfig::per_minute(config.requests_per_minute);

        Ok(Self {
            http_client,
            base_url,
            rate_limiter: Arc::new(RateLimiter::new(rate_config)),
            metrics: Arc::new(MetricsCollector::new()),
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, CoreError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, endpoint)).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid endpoint '{}': {}", endpoint, e),
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = self.endpoint_url(endpoint)?;

        let queue_wait = self.rate_limiter.acquire().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, queue_wait
        );

        let mut request_builder = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .header("User-Agent", &self.user_agent);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let start_time = Instant::now();
        let sent = request_builder.send().await;
        let response_time = start_time.elapsed();

        let mut request_metrics = RequestMetrics {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status_code: None,
            response_time,
            queue_wait,
            success: false,
            rate_limited: false,
            error_type: None,
        };

        let result = match sent {
            Ok(response) => {
                request_metrics.status_code = Some(response.status().as_u16());
                self.observe_quota_headers(&response).await;
                self.check_status(endpoint, response, &mut request_metrics)
                    .await
            }
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                request_metrics.error_type = Some("network_error".to_string());
                if e.is_timeout() {
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    Err(CoreError::Network(e))
                }
            }
        };

        self.metrics.record_request(request_metrics).await;
        result
    }

    async fn observe_quota_headers(&self, response: &Response) {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
        };

        let remaining = header("x-ratelimit-remaining").and_then(|v| v.parse::<f64>().ok());
        let reset = header("x-ratelimit-reset").and_then(|v| v.parse::<f64>().ok());

        self.rate_limiter
            .observe_quota(remaining, reset.map(|secs| secs.max(0.0).ceil() as u64))
            .await;
    }

    async fn check_status(
        &self,
        endpoint: &str,
        response: Response,
        request_metrics: &mut RequestMetrics,
    ) -> Result<Response, CoreError> {
        let status = response.status();
        if status.is_success() {
            request_metrics.success = true;
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);

        let (error_type, error) = match status {
            StatusCode::TOO_MANY_REQUESTS => {
                request_metrics.rate_limited = true;
                self.rate_limiter.record_rate_limited().await;

                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                (
                    "rate_limited",
                    RedditApiError::RateLimitExceeded { retry_after },
                )
            }
            StatusCode::UNAUTHORIZED => ("unauthorized", RedditApiError::InvalidToken),
            StatusCode::FORBIDDEN => (
                "forbidden",
                RedditApiError::Forbidden {
                    resource: endpoint.to_string(),
                },
            ),
            StatusCode::NOT_FOUND => match subreddit_of(endpoint) {
                Some(subreddit) => (
                    "not_found",
                    RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    },
                ),
                None => (
                    "not_found",
                    RedditApiError::NotFound {
                        resource: endpoint.to_string(),
                    },
                ),
            },
            s if s.is_server_error() => (
                "server_error",
                RedditApiError::ServerError {
                    status_code: s.as_u16(),
                },
            ),
            s => (
                "unexpected_status",
                RedditApiError::InvalidResponse {
                    details: format!("Unexpected status {} for {}", s, endpoint),
                },
            ),
        };

        request_metrics.error_type = Some(error_type.to_string());
        Err(CoreError::RedditApi(error))
    }

    /// Fetch one page of search results restricted to `subreddit`.
    pub async fn search_subreddit(
        &self,
        access_token: &str,
        subreddit: &str,
        query: &SearchQuery,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/search", subreddit);
        let limit_str = limit.clamp(1, MAX_PAGE_SIZE).to_string();

        let mut params = vec![
            ("q", query.query.as_str()),
            ("restrict_sr", "1"),
            ("sort", query.sort.as_str()),
            ("t", query.time_filter.as_str()),
            ("limit", limit_str.as_str()),
            ("raw_json", "1"),
        ];
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(&params))
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse search results: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse search results for r/{}", subreddit),
            })
        })?;

        debug!(
            "Retrieved {} posts from r/{} (after: {:?})",
            listing.data.children.len(),
            subreddit,
            after
        );
        Ok(listing)
    }

    /// Fetch a submission and flatten its comment tree.
    pub async fn fetch_comment_tree(
        &self,
        access_token: &str,
        submission_id: &str,
    ) -> Result<Vec<FlatComment>, CoreError> {
        let endpoint = format!("/comments/{}", submission_id);
        let params = [("raw_json", "1")];

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(&params))
            .await?;

        let (post, comments): (RedditListing<RedditPostData>, CommentListing) =
            response.json().await.map_err(|e| {
                error!("Failed to parse comment tree: {}", e);
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("Failed to parse comments for {}", submission_id),
                })
            })?;

        let post_author = post
            .data
            .children
            .first()
            .map(|child| child.data.author.as_str())
            .filter(|author| is_known_author(author));

        let flat = flatten_comment_tree(comments.data.children, post_author);
        debug!("Retrieved {} comments for {}", flat.len(), submission_id);
        Ok(flat)
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

fn subreddit_of(endpoint: &str) -> Option<&str> {
    let mut segments = endpoint.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("r"), Some(name)) if !name.is_empty() => Some(name),
        _ => None,
    }
}
