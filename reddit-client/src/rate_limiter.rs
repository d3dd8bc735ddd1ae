use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn reddit_oauth() -> Self {
        Self::per_minute(100) // Reddit allows 100 requests per minute for OAuth2 clients
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests: max_requests.max(1),
            time_window: Duration::from_secs(60),
            burst_allowance: 10.min(max_requests.max(1)),
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    /// Quota reported by Reddit in `x-ratelimit-remaining`.
    server_remaining: Option<f64>,
    /// When the server-side window resets, from `x-ratelimit-reset`.
    server_reset_at: Option<Instant>,
}

/// Token bucket in front of every API call, corrected by the quota headers
/// Reddit returns with each response.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    capacity: f64,
    refill_rate: f64, // tokens per second
    state: Mutex<BucketState>,
    window_tracker: Mutex<WindowTracker>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();
        let window_tracker = WindowTracker::new(config.time_window);

        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                server_remaining: None,
                server_reset_at: None,
            }),
            window_tracker: Mutex::new(window_tracker),
            config,
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;

        if let Some(reset_at) = state.server_reset_at {
            if now >= reset_at {
                state.server_remaining = None;
                state.server_reset_at = None;
            }
        }
    }

    /// Take one token, or report how long to wait before one is available.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        self.refill(&mut state, now);

        if let (Some(remaining), Some(reset_at)) = (state.server_remaining, state.server_reset_at) {
            if remaining < 1.0 {
                return Err(reset_at.saturating_duration_since(now));
            }
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            if let Some(remaining) = state.server_remaining.as_mut() {
                *remaining -= 1.0;
            }
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    /// Wait until a request may be sent. Returns the time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let start_time = Instant::now();

        loop {
            match self.try_acquire().await {
                Ok(()) => break,
                Err(wait_time) => {
                    debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time.max(Duration::from_millis(1))).await;
                }
            }
        }

        self.window_tracker.lock().await.record_request();
        start_time.elapsed()
    }

    /// Feed back the `x-ratelimit-remaining` / `x-ratelimit-reset` response headers.
    pub async fn observe_quota(&self, remaining: Option<f64>, reset_secs: Option<u64>) {
        let Some(remaining) = remaining else {
            return;
        };

        let mut state = self.state.lock().await;
        state.server_remaining = Some(remaining);
        state.server_reset_at = reset_secs.map(|secs| Instant::now() + Duration::from_secs(secs));

        if remaining < 1.0 {
            warn!(
                "Reddit quota exhausted, next request waits {}s for the window reset",
                reset_secs.unwrap_or(0)
            );
        }
    }

    pub async fn record_rate_limited(&self) {
        self.window_tracker.lock().await.record_rate_limited();
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let now = Instant::now();
        let (available_tokens, server_remaining) = {
            let mut state = self.state.lock().await;
            self.refill(&mut state, now);
            (state.tokens, state.server_remaining)
        };
        let window_stats = self.window_tracker.lock().await.get_current_window_stats();

        RateLimitStatus {
            available_tokens: available_tokens as u32,
            max_tokens: self.config.burst_allowance,
            requests_per_minute: self.config.max_requests,
            current_window_requests: window_stats.request_count,
            rate_limited_requests: window_stats.rate_limited_requests,
            window_start_time: window_stats.window_start,
            server_remaining: server_remaining.map(|r| r.max(0.0) as u32),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub requests_per_minute: u32,
    pub current_window_requests: u32,
    pub rate_limited_requests: u32,
    pub window_start_time: SystemTime,
    pub server_remaining: Option<u32>,
}

impl RateLimitStatus {
    pub fn utilization_percentage(&self) -> f64 {
        let used_tokens = self.max_tokens.saturating_sub(self.available_tokens);
        (used_tokens as f64 / self.max_tokens.max(1) as f64) * 100.0
    }

    pub fn requests_remaining_in_window(&self) -> u32 {
        self.requests_per_minute
            .saturating_sub(self.current_window_requests)
    }
}

#[derive(Debug)]
pub struct WindowTracker {
    window_duration: Duration,
    current_window: WindowStats,
}

#[derive(Debug, Clone)]
pub struct WindowStats {
    pub window_start: SystemTime,
    pub request_count: u32,
    pub rate_limited_requests: u32,
}

impl WindowTracker {
    pub fn new(window_duration: Duration) -> Self {
        Self {
            window_duration,
            current_window: WindowStats {
                window_start: SystemTime::now(),
                request_count: 0,
                rate_limited_requests: 0,
            },
        }
    }

    pub fn record_request(&mut self) {
        self.ensure_current_window();
        self.current_window.request_count += 1;
    }

    pub fn record_rate_limited(&mut self) {
        self.ensure_current_window();
        self.current_window.rate_limited_requests += 1;
    }

    pub fn get_current_window_stats(&self) -> WindowStats {
        self.current_window.clone()
    }

    fn ensure_current_window(&mut self) {
        let now = SystemTime::now();
        let window_age = now
            .duration_since(self.current_window.window_start)
            .unwrap_or_default();

        if window_age >= self.window_duration {
            self.current_window = WindowStats {
                window_start: now,
                request_count: 0,
                rate_limited_requests: 0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_then_exhausted() {
        let config = RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(10),
            burst_allowance: 5,
        };
        let limiter = RateLimiter::new(config);

        for _ in 0..5 {
            assert!(limiter.try_acquire().await.is_ok());
        }

        let wait = limiter.try_acquire().await.unwrap_err();
        assert!(wait <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_refill_over_time() {
        let config = RateLimitConfig {
            max_requests: 60, // 1 token per second
            time_window: Duration::from_secs(60),
            burst_allowance: 1,
        };
        let limiter = RateLimiter::new(config);

        assert!(limiter.try_acquire().await.is_ok());
        assert!(limiter.try_acquire().await.is_err());

        sleep(Duration::from_millis(1100)).await;
        assert!(limiter.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_server_quota_blocks_until_reset() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        limiter.observe_quota(Some(0.0), Some(30)).await;
        let wait = limiter.try_acquire().await.unwrap_err();
        assert!(wait > Duration::from_secs(25));
        assert!(wait <= Duration::from_secs(30));

        let status = limiter.get_rate_limit_status().await;
        assert_eq!(status.server_remaining, Some(0));
    }

    #[tokio::test]
    async fn test_server_quota_without_reset_is_ignored_for_waiting() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        limiter.observe_quota(Some(0.0), None).await;
        assert!(limiter.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_records_window_requests() {
        let limiter = RateLimiter::new(RateLimitConfig::reddit_oauth());

        let waited = limiter.acquire().await;
        limiter.acquire().await;
        limiter.record_rate_limited().await;

        let status = limiter.get_rate_limit_status().await;
        assert!(waited < Duration::from_secs(1));
        assert_eq!(status.current_window_requests, 2);
        assert_eq!(status.rate_limited_requests, 1);
        assert_eq!(status.requests_remaining_in_window(), 98);
        assert!(status.utilization_percentage() >= 0.0 && status.utilization_percentage() <= 100.0);
    }

    #[test]
    fn test_per_minute_config() {
        let config = RateLimitConfig::per_minute(3);
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.burst_allowance, 3);

        let reddit = RateLimitConfig::reddit_oauth();
        assert_eq!(reddit.max_requests, 100);
        assert_eq!(reddit.burst_allowance, 10);
    }
}
