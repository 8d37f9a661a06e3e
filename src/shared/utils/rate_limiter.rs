//! Token-bucket limiter shared by every worker task
//!
//! Wraps a governor GCRA limiter configured with a steady rate and a burst
//! capacity. Within any window of length `T` at most `rate * T + burst`
//! acquisitions succeed.

use crate::shared::errors::{AppError, AppResult};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

pub struct RateLimiter {
    limiter: DirectLimiter,
    requests_per_second: f64,
    burst: u32,
    acquired: AtomicU64,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, burst: u32) -> AppResult<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(AppError::ConfigError(format!(
                "Rate limiter needs a positive request rate, got {}",
                requests_per_second
            )));
        }

        // Convert rate to duration between requests
        let period = Duration::from_secs_f64(1.0 / requests_per_second);
        let burst_size = NonZeroU32::new(burst.max(1)).ok_or_else(|| {
            AppError::ConfigError("Rate limiter burst must be at least 1".to_string())
        })?;
        let quota = Quota::with_period(period)
            .ok_or_else(|| {
                AppError::ConfigError(format!(
                    "Request rate {} is too high to express as a period",
                    requests_per_second
                ))
            })?
            .allow_burst(burst_size);

        Ok(Self {
            limiter: GovernorRateLimiter::direct(quota),
            requests_per_second,
            burst: burst_size.get(),
            acquired: AtomicU64::new(0),
        })
    }

    /// Wait for a token, or fail once `cancel` fires
    pub async fn acquire(&self, cancel: &CancellationToken) -> AppResult<()> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(
                "rate limiter acquisition abandoned".to_string(),
            ));
        }

        tokio::select! {
            _ = self.limiter.until_ready() => {
                self.acquired.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            _ = cancel.cancelled() => Err(AppError::Cancelled(
                "rate limiter acquisition abandoned".to_string(),
            )),
        }
    }

    /// Take a token only if one is available right now
    pub fn try_acquire(&self) -> bool {
        let ok = self.limiter.check().is_ok();
        if ok {
            self.acquired.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }

    /// Upper bound on acquisitions within a window of the given length
    pub fn max_acquisitions_within(&self, window: Duration) -> u64 {
        (self.requests_per_second * window.as_secs_f64()).floor() as u64 + u64::from(self.burst)
    }

    pub fn total_acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}
