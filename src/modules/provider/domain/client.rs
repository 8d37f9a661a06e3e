use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde_json::Value;

/// Data source the pipeline pulls from.
///
/// Errors come back classified: `RateLimited { retry_after }` for provider
/// throttling, `TransientError` for network and 5xx failures, `FatalError` for
/// configuration or auth problems and `ValidationError` for malformed payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSourceClient: Send + Sync {
    /// Run one query and return its `data` payload
    async fn execute(&self, query: &str, variables: &Value) -> AppResult<Value>;
}
