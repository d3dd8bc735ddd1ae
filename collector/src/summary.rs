use chrono::{DateTime, Utc};
use infonet_core::Category;
use reddit_client::{ApiMetrics, RateLimitStatus, RetryMetrics};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubredditSummary {
    pub subreddit: String,
    pub submissions: usize,
    pub comments: usize,
    /// Search results dropped by the date window or keyword filter.
    pub filtered_out: usize,
    /// Submissions kept without comments because their tree could not be fetched.
    pub comment_fetch_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSubreddit {
    pub subreddit: String,
    pub error_code: String,
    pub message: String,
}

/// What one `collect` run produced for a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub run_id: Uuid,
    pub category: Category,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub subreddits: Vec<SubredditSummary>,
    pub skipped: Vec<SkippedSubreddit>,
    pub total_records: usize,
    pub unique_users: usize,
    pub edges: usize,
    pub self_replies: usize,
    pub unresolved_replies: usize,
    pub api: ApiMetrics,
    pub retries: RetryMetrics,
    /// Limiter state when the run finished.
    pub rate_limit: RateLimitStatus,
}

impl CollectionSummary {
    pub fn collected_subreddits(&self) -> usize {
        self.subreddits.len()
    }

    pub fn log_line(&self) -> String {
        format!(
            "{}: {} records from {} subreddits ({} skipped), {} users, {} edges",
            self.category.label(),
            self.total_records,
            self.subreddits.len(),
            self.skipped.len(),
            self.unique_users,
            self.edges
        )
    }

    pub fn throttle_line(&self) -> String {
        format!(
            "{} retries ({} recovered, {} gave up, {:.1}s backoff), {} requests left in window, burst {:.0}% used, {} rate-limited",
            self.retries.total_retries,
            self.retries.successful_retries,
            self.retries.failed_operations,
            self.retries.total_delay.as_secs_f64(),
            self.rate_limit.requests_remaining_in_window(),
            self.rate_limit.utilization_percentage(),
            self.rate_limit.rate_limited_requests
        )
    }
}
