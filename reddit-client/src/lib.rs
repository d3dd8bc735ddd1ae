pub mod api;
pub mod auth;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;

#[cfg(test)]
mod tests;

pub use api::{
    flatten_comment_tree, CommentListing, CommentThing, FlatComment, RedditApiClient,
    RedditCommentData, RedditListing, RedditPostData, SearchQuery, MAX_PAGE_SIZE,
};
pub use auth::{GrantType, RedditAuth, RedditCredentials, RedditToken};
pub use metrics::{ApiMetrics, EndpointMetrics, MetricsCollector};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use retry::{RetryConfig, RetryExecutor, RetryMetrics};

use infonet_core::{CoreError, RedditApiError, RedditConfig};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Authenticated, rate-limited and retrying access to the Reddit API.
#[derive(Debug)]
pub struct RedditClient {
    auth: RedditAuth,
    api: RedditApiClient,
    retry: RetryExecutor,
    token: Mutex<Option<RedditToken>>,
}

impl RedditClient {
    pub fn new(config: &RedditConfig, max_attempts: u32) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(config)?;
        let auth = RedditAuth::new(config, api.http_client().clone())?;

        Ok(Self {
            auth,
            api,
            retry: RetryExecutor::new(RetryConfig::reddit(max_attempts)),
            token: Mutex::new(None),
        })
    }

    /// Replace the retry policy, mostly to shorten delays.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    /// Exchange credentials for a fresh access token.
    pub async fn authenticate(&self) -> Result<(), CoreError> {
        let token = self.auth.authenticate().await?;
        *self.token.lock().await = Some(token);
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token
            .lock()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_expired())
    }

    async fn access_token(&self) -> Result<String, CoreError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.access_token.clone());
        }

        if guard.is_some() {
            info!("Access token expired, re-authenticating");
        }
        let token = self.auth.authenticate().await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    /// Run one API call with a valid token; a rejected token is dropped so the
    /// next attempt re-authenticates.
    async fn with_token<F, Fut, T>(&self, call: F) -> Result<T, CoreError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let access_token = self.access_token().await?;
        let result = call(access_token).await;
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            debug!("Token rejected by Reddit, discarding it");
            *self.token.lock().await = None;
        }
        result
    }

    pub async fn search_subreddit(
        &self,
        subreddit: &str,
        query: &SearchQuery,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let operation = format!("search r/{}", subreddit);
        self.retry
            .execute(&operation, || {
                self.with_token(|token| async move {
                    self.api
                        .search_subreddit(&token, subreddit, query, limit, after)
                        .await
                })
            })
            .await
    }

    pub async fn fetch_comment_tree(&self, submission_id: &str) -> Result<Vec<FlatComment>, CoreError> {
        let operation = format!("comments {}", submission_id);
        self.retry
            .execute(&operation, || {
                self.with_token(|token| async move {
                    self.api.fetch_comment_tree(&token, submission_id).await
                })
            })
            .await
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.api.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.api.get_rate_limit_status().await
    }

    pub async fn get_retry_metrics(&self) -> RetryMetrics {
        self.retry.get_metrics().await
    }
}
