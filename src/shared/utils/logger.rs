use log::{debug, error, info, warn};
use std::sync::Once;
use std::time::{Duration, Instant};

static INIT: Once = Once::new();

/// Initialize env_logger once; `RUST_LOG` overrides the defaults below
pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .filter_module("keystone_sync", log::LevelFilter::Debug)
            .filter_module("diesel", log::LevelFilter::Warn)
            .filter_module("reqwest", log::LevelFilter::Warn)
            .filter_module("tokio_cron_scheduler", log::LevelFilter::Warn)
            .parse_default_env()
            .format_timestamp_secs()
            .format_module_path(false)
            .init();

        info!("Logging initialized");
    });
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

/// One-line log formats shared by the pipeline modules
pub struct LogContext;

impl LogContext {
    pub fn db_operation(operation: &str, table: &str, duration_ms: Option<u64>) {
        match duration_ms {
            Some(duration) => debug!("DB: {} on {} in {}ms", operation, table, duration),
            None => debug!("DB: {} on {}", operation, table),
        }
    }

    /// Outcome of one provider call made by a worker
    pub fn api_call(job_type: &str, target: &str, status: &str, duration_ms: u64) {
        debug!("API: {} {} {} in {}ms", job_type, target, status, duration_ms);
    }

    /// A worker sleeping through a provider rate limit
    pub fn rate_limit_backoff(target: &str, attempt: u32, delay: Duration) {
        warn!(
            "{} rate limited (attempt {}), backing off for {:.1}s",
            target,
            attempt,
            delay.as_secs_f64()
        );
    }

    pub fn phase_progress(phase: &str, current: usize, total: usize, key: &str) {
        info!("{}: [{}/{}] {}", phase, current, total, key);
    }

    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!("{}: {}", context, error);
    }

    pub fn slow_operation(operation: &str, duration_ms: u64, threshold_ms: u64) {
        if duration_ms > threshold_ms {
            warn!("Slow {}: {}ms (threshold {}ms)", operation, duration_ms, threshold_ms);
        }
    }
}

/// Logs the duration of an operation together with a summary once it ends
pub struct TimedOperation {
    start: Instant,
    operation: String,
}

impl TimedOperation {
    pub fn new(operation: &str) -> Self {
        debug!("Starting {}", operation);
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
        }
    }

    pub fn finish_with_info(self, summary: &str) -> u64 {
        let duration = self.start.elapsed().as_millis() as u64;
        info!("{} finished in {}ms: {}", self.operation, duration, summary);
        duration
    }
}
