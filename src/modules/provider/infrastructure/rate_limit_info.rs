//! Rate-limit hints carried by HTTP 429 responses

use std::time::Duration;

/// Information extracted from HTTP 429 responses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// How long to wait before next request (from Retry-After header)
    pub retry_after: Option<Duration>,
    /// When the rate limit resets (from X-RateLimit-Reset header)
    pub reset_time: Option<Duration>,
    /// Number of requests remaining (from X-RateLimit-Remaining header)
    pub remaining: Option<u32>,
}

impl RateLimitInfo {
    /// Parse rate limit information from HTTP response headers
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

        let retry_after = header("retry-after")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        // Reset is an epoch timestamp
        let reset_time = header("x-ratelimit-reset")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|timestamp| {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                Duration::from_secs(timestamp.saturating_sub(now))
            });

        let remaining = header("x-ratelimit-remaining").and_then(|s| s.trim().parse::<u32>().ok());

        Self {
            retry_after,
            reset_time,
            remaining,
        }
    }

    /// Get the best delay recommendation from available information
    pub fn recommended_delay(&self) -> Option<Duration> {
        self.retry_after.or(self.reset_time)
    }
}
