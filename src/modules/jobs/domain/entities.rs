/// Domain entities for the worker pool
///
/// A job is one outbound data-source request. It is immutable once submitted
/// and consumed by exactly one worker task.
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Job type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Rankings,
    ReportFights,
    PlayerDetails,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Rankings => write!(f, "rankings"),
            JobType::ReportFights => write!(f, "report_fights"),
            JobType::PlayerDetails => write!(f, "player_details"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub query: String,
    pub variables: serde_json::Value,
    pub metadata: HashMap<String, String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: JobType, query: impl Into<String>, variables: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            query: query.into(),
            variables,
            metadata: HashMap::new(),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Copy for another attempt; results are routed by job id
    pub fn resubmission(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Short label for logs: the `target` metadata entry when present
    pub fn label(&self) -> String {
        match self.metadata.get("target") {
            Some(target) => format!("{} {}", self.job_type, target),
            None => format!("{} {}", self.job_type, self.id),
        }
    }
}

/// Outcome of one job, produced by the worker that executed it
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job: Job,
    pub outcome: AppResult<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Provider rate limits the worker slept through before this outcome
    pub rate_limit_retries: u32,
}

impl JobResult {
    pub fn cancelled(job: Job) -> Self {
        let now = Utc::now();
        Self {
            job,
            outcome: Err(AppError::Cancelled(
                "worker pool shut down before the job ran".to_string(),
            )),
            started_at: now,
            ended_at: now,
            rate_limit_retries: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.ended_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Calls made against the data source for this job
    pub fn api_requests(&self) -> u64 {
        match &self.outcome {
            Err(AppError::Cancelled(_)) if self.rate_limit_retries == 0 => 0,
            _ => u64::from(self.rate_limit_retries) + 1,
        }
    }
}
