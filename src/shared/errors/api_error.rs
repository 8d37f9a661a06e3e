use thiserror::Error;

/// Classified outcome of a failed data-source call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimit { retry_after: u64 },

    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },

    #[error("GraphQL errors: {}", messages.join(", "))]
    GraphQl { messages: Vec<String> },

    #[error("Request rejected: HTTP {status}")]
    BadRequest { status: u16 },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("API authentication failed")]
    AuthenticationFailed,

    #[error("API service unavailable")]
    ServiceUnavailable,
}

impl ApiError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, retry_after: Option<u64>) -> Self {
        match status {
            429 => ApiError::RateLimit {
                retry_after: retry_after.unwrap_or(60),
            },
            401 | 403 => ApiError::AuthenticationFailed,
            408 | 425 | 500..=599 => ApiError::ServiceUnavailable,
            _ => ApiError::BadRequest { status },
        }
    }
}
