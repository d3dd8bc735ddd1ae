use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub average_response_time: Duration,
    pub total_queue_wait: Duration,
    pub last_request_time: Option<SystemTime>,
    pub requests_by_endpoint: BTreeMap<String, EndpointMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
    pub min_response_time: Duration,
    pub max_response_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub queue_wait: Duration,
    pub success: bool,
    pub rate_limited: bool,
    pub error_type: Option<String>,
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rate_limited_requests: 0,
            average_response_time: Duration::from_millis(0),
            total_queue_wait: Duration::from_millis(0),
            last_request_time: None,
            requests_by_endpoint: BTreeMap::new(),
        }
    }
}

impl ApiMetrics {
    pub fn summary_line(&self) -> String {
        format!(
            "{} requests ({} ok, {} failed, {} rate limited), avg {:?}, queued {:?}",
            self.total_requests,
            self.successful_requests,
            self.failed_requests,
            self.rate_limited_requests,
            self.average_response_time,
            self.total_queue_wait
        )
    }
}

impl EndpointMetrics {
    fn new() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            error_count: 0,
            total_response_time: Duration::from_millis(0),
            min_response_time: Duration::MAX,
            max_response_time: Duration::from_millis(0),
        }
    }

    fn update(&mut self, metrics: &RequestMetrics) {
        self.request_count += 1;
        self.total_response_time += metrics.response_time;
        self.min_response_time = self.min_response_time.min(metrics.response_time);
        self.max_response_time = self.max_response_time.max(metrics.response_time);

        if metrics.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::from_millis(0)
        } else {
            self.total_response_time / self.request_count as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }
}

/// Collapse concrete paths into templates so `/r/science/search` and
/// `/r/medicine/search` share one entry.
pub fn endpoint_template(endpoint: &str) -> String {
    let segments: Vec<&str> = endpoint.trim_matches('/').split('/').collect();
    let templated: Vec<&str> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| match (i, segments.first()) {
            (1, Some(&"r")) => "{subreddit}",
            (1, Some(&"comments")) => "{id}",
            (3, Some(&"r")) if segments.get(2) == Some(&"comments") => "{id}",
            _ => *segment,
        })
        .collect();
    format!("/{}", templated.join("/"))
}

#[derive(Debug)]
pub struct MetricsCollector {
    metrics: RwLock<ApiMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(ApiMetrics::default()),
        }
    }

    pub async fn record_request(&self, request_metrics: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.last_request_time = Some(SystemTime::now());
        metrics.total_queue_wait += request_metrics.queue_wait;

        if request_metrics.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }

        if request_metrics.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        let previous_total = metrics.average_response_time * (metrics.total_requests - 1) as u32;
        metrics.average_response_time =
            (previous_total + request_metrics.response_time) / metrics.total_requests as u32;

        metrics
            .requests_by_endpoint
            .entry(endpoint_template(&request_metrics.endpoint))
            .or_insert_with(EndpointMetrics::new)
            .update(&request_metrics);
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(endpoint: &str, millis: u64, success: bool) -> RequestMetrics {
        RequestMetrics {
            endpoint: endpoint.to_string(),
            method: "GET".to_string(),
            status_code: Some(if success { 200 } else { 500 }),
            response_time: Duration::from_millis(millis),
            queue_wait: Duration::from_millis(5),
            success,
            rate_limited: false,
            error_type: None,
        }
    }

    #[test]
    fn test_endpoint_templates() {
        assert_eq!(endpoint_template("/r/science/search"), "/r/{subreddit}/search");
        assert_eq!(endpoint_template("/comments/abc123"), "/comments/{id}");
        assert_eq!(
            endpoint_template("/r/science/comments/abc123"),
            "/r/{subreddit}/comments/{id}"
        );
        assert_eq!(endpoint_template("/api/v1/me"), "/api/v1/me");
    }

    #[tokio::test]
    async fn test_metrics_collection() {
        let collector = MetricsCollector::new();

        collector.record_request(request("/r/science/search", 100, true)).await;
        collector.record_request(request("/r/medicine/search", 300, false)).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.average_response_time, Duration::from_millis(200));
        assert_eq!(metrics.total_queue_wait, Duration::from_millis(10));
        assert!(metrics.last_request_time.is_some());
        assert_eq!(metrics.requests_by_endpoint.len(), 1);
    }

    #[tokio::test]
    async fn test_endpoint_metrics() {
        let collector = MetricsCollector::new();
        collector.record_request(request("/comments/abc", 100, true)).await;
        collector.record_request(request("/comments/def", 300, true)).await;

        let all = collector.get_metrics().await;
        let metrics = &all.requests_by_endpoint["/comments/{id}"];
        assert_eq!(metrics.request_count, 2);
        assert_eq!(metrics.success_rate(), 1.0);
        assert_eq!(metrics.average_response_time(), Duration::from_millis(200));
        assert_eq!(metrics.min_response_time, Duration::from_millis(100));
        assert_eq!(metrics.max_response_time, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_metrics_serialize_with_endpoint_templates() {
        let collector = MetricsCollector::new();
        collector.record_request(request("/r/science/search", 150, true)).await;

        let exported = serde_json::to_string(&collector.get_metrics().await).unwrap();
        assert!(exported.contains("\"total_requests\":1"));
        assert!(exported.contains("/r/{subreddit}/search"));
    }
}
