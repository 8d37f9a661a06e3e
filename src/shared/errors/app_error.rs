use std::time::Duration;
use thiserror::Error;

use super::api_error::ApiError;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Transient error: {0}")]
    TransientError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Fatal error: {0}")]
    FatalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Already running: {0}")]
    AlreadyRunning(String),

    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("{} batch(es) failed: {}", failed.len(), failed.join("; "))]
    PartialFailure { failed: Vec<String> },
}

impl AppError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited { .. })
    }

    /// Whether a bounded local retry can be expected to help
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::TransientError(_) | AppError::DatabaseError(_) | AppError::Timeout(_)
        )
    }

    /// Errors that abort the whole run instead of a single unit of work
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::FatalError(_) | AppError::ConfigError(_) | AppError::Cancelled(_)
        )
    }

    /// Fatal errors a later run cannot clear on its own
    pub fn needs_intervention(&self) -> bool {
        matches!(self, AppError::FatalError(_) | AppError::ConfigError(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RateLimit { retry_after } => AppError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            },
            ApiError::ServiceUnavailable | ApiError::Network { .. } => {
                AppError::TransientError(err.to_string())
            }
            ApiError::InvalidResponse { .. } | ApiError::GraphQl { .. } => {
                AppError::ValidationError(err.to_string())
            }
            ApiError::AuthenticationFailed | ApiError::BadRequest { .. } => {
                AppError::FatalError(err.to_string())
            }
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                AppError::NotFound("Record not found in database".to_string())
            }
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for AppError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        AppError::DatabaseError(format!("Database pool error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::TransientError("Request timeout".to_string())
        } else if err.is_connect() {
            AppError::TransientError("Failed to connect to data source".to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                429 => AppError::RateLimited {
                    retry_after: Duration::from_secs(60),
                },
                401 | 403 => AppError::FatalError(format!("Not authorized: HTTP {}", status)),
                500..=599 => AppError::TransientError(format!("HTTP {}: {}", status, err)),
                _ => AppError::FatalError(format!("HTTP {}: {}", status, err)),
            }
        } else {
            AppError::TransientError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for AppError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        AppError::SchedulerError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("Task failed to complete: {}", err))
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
