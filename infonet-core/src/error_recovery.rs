//! Recovery decisions for errors raised while collecting a subreddit.
//!
//! Collection is a batch job over many subreddits. A failure on one of them should
//! normally cost only that subreddit; only errors that would fail identically for
//! every remaining subreddit (bad credentials, broken configuration, a full disk)
//! abort the run.

use crate::{CoreError, ErrorExt, RedditApiError};
use std::time::Duration;

/// What the collector should do after an operation failed.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionAction {
    /// Try the same request again after the given delay
    Retry { delay: Duration },
    /// Log the error, drop this subreddit and continue with the next one
    SkipSubreddit,
    /// Stop collecting altogether
    AbortRun,
}

impl CollectionAction {
    pub fn is_abort(&self) -> bool {
        matches!(self, CollectionAction::AbortRun)
    }
}

pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Decide how to continue after `error`, given how many attempts were already made.
    pub fn for_collection(error: &CoreError, attempts: u32, max_attempts: u32) -> CollectionAction {
        match error {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
            | CoreError::Config(_)
            | CoreError::Io(_)
            | CoreError::Storage(_) => CollectionAction::AbortRun,

            // A rejected token is re-acquired by the client; if it keeps failing the
            // credentials are wrong.
            CoreError::RedditApi(RedditApiError::InvalidToken) if attempts >= max_attempts => {
                CollectionAction::AbortRun
            }

            _ if error.is_retryable() && attempts < max_attempts => CollectionAction::Retry {
                delay: error.retry_after().unwrap_or(Duration::from_secs(2)),
            },

            CoreError::RedditApi(RedditApiError::InvalidToken) => CollectionAction::Retry {
                delay: Duration::ZERO,
            },

            _ => CollectionAction::SkipSubreddit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use std::io;

    #[test]
    fn test_auth_failure_aborts() {
        let error = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
            reason: "invalid_grant".to_string(),
        });
        assert!(ErrorRecovery::for_collection(&error, 1, 3).is_abort());
    }

    #[test]
    fn test_forbidden_subreddit_is_skipped() {
        let error = CoreError::RedditApi(RedditApiError::Forbidden {
            resource: "/r/private/search".to_string(),
        });
        assert_eq!(
            ErrorRecovery::for_collection(&error, 1, 3),
            CollectionAction::SkipSubreddit
        );
    }

    #[test]
    fn test_rate_limit_retries_with_server_delay() {
        let error = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 7 });
        assert_eq!(
            ErrorRecovery::for_collection(&error, 1, 3),
            CollectionAction::Retry {
                delay: Duration::from_secs(7)
            }
        );
    }

    #[test]
    fn test_exhausted_retries_skip() {
        let error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
        assert_eq!(
            ErrorRecovery::for_collection(&error, 3, 3),
            CollectionAction::SkipSubreddit
        );
    }

    #[test]
    fn test_invalid_token_retried_then_aborts() {
        let error = CoreError::RedditApi(RedditApiError::InvalidToken);
        assert!(matches!(
            ErrorRecovery::for_collection(&error, 1, 3),
            CollectionAction::Retry { .. }
        ));
        assert!(ErrorRecovery::for_collection(&error, 3, 3).is_abort());
    }

    #[test]
    fn test_local_failures_abort() {
        let io_error = CoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(ErrorRecovery::for_collection(&io_error, 1, 3).is_abort());

        let config_error = CoreError::Config(ConfigError::MissingField {
            field: "reddit.client_id".to_string(),
        });
        assert!(ErrorRecovery::for_collection(&config_error, 1, 3).is_abort());
    }
}
