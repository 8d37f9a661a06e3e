use super::rate_limit_info::RateLimitInfo;
use crate::log_debug;
use crate::modules::provider::domain::DataSourceClient;
use crate::shared::config::ApiConfig;
use crate::shared::errors::{ApiError, AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// GraphQL client for the combat-log provider
pub struct WarcraftLogsClient {
    client: Client,
    endpoint: String,
    token: String,
}

impl WarcraftLogsClient {
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigError("WCL_API_TOKEN environment variable not found".to_string())
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("keystone-sync/0.1")
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token,
        })
    }
}

#[async_trait]
impl DataSourceClient for WarcraftLogsClient {
    async fn execute(&self, query: &str, variables: &Value) -> AppResult<Value> {
        let request = GraphQlRequest { query, variables };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let info = RateLimitInfo::from_headers(response.headers());
            log_debug!(
                "Data source answered HTTP {} (remaining quota: {:?})",
                status,
                info.remaining
            );
            let retry_after = info.recommended_delay().map(|d| d.as_secs());
            return Err(ApiError::from_status(status.as_u16(), retry_after).into());
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: format!("undecodable body: {}", e),
            })?;

        if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
            return Err(ApiError::GraphQl {
                messages: errors.into_iter().map(|e| e.message).collect(),
            }
            .into());
        }

        body.data.ok_or_else(|| {
            ApiError::InvalidResponse {
                message: "response contained no data".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_token() {
        let config = ApiConfig {
            token: None,
            ..ApiConfig::default()
        };
        assert!(matches!(
            WarcraftLogsClient::new(&config),
            Err(AppError::ConfigError(_))
        ));

        let config = ApiConfig {
            token: Some("secret".to_string()),
            ..ApiConfig::default()
        };
        assert!(WarcraftLogsClient::new(&config).is_ok());
    }
}
