//! Runs units of fetch work on the worker pool with bounded retries
use crate::modules::jobs::domain::Job;
use crate::modules::jobs::WorkerPool;
use crate::modules::provider::domain::{queries, RankingsPage};
use crate::modules::rankings::domain::{BatchResult, Ranking, RankingBatch};
use crate::shared::config::BatchConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BatchProcessorConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&BatchConfig> for BatchProcessorConfig {
    fn from(batch: &BatchConfig) -> Self {
        Self {
            max_attempts: batch.max_attempts,
            retry_delay: batch.retry_delay(),
        }
    }
}

/// Outcome of a job after every attempt it was allowed
#[derive(Debug)]
pub struct JobRun {
    pub outcome: AppResult<Value>,
    /// Failed attempts plus rate-limit waits inside the worker
    pub retries: u32,
    pub api_requests: u64,
}

pub struct BatchProcessor {
    pool: Arc<WorkerPool>,
    config: BatchProcessorConfig,
}

impl BatchProcessor {
    pub fn new(pool: Arc<WorkerPool>, config: BatchProcessorConfig) -> Self {
        Self { pool, config }
    }

    /// Submit `job` and retry retryable failures up to `max_attempts` times with
    /// a fixed pause. Rate limits the worker could not absorb, validation and
    /// fatal errors are returned at once.
    pub async fn run_job(&self, job: Job, cancel: &CancellationToken) -> JobRun {
        let label = job.label();
        let max_attempts = self.config.max_attempts.max(1);
        let mut retries = 0;
        let mut api_requests = 0;

        for attempt in 1..=max_attempts {
            let result = match self.pool.submit_and_wait(job.resubmission(), cancel).await {
                Ok(result) => result,
                Err(e) => {
                    return JobRun {
                        outcome: Err(e),
                        retries,
                        api_requests,
                    }
                }
            };
            retries += result.rate_limit_retries;
            api_requests += result.api_requests();

            let error = match result.outcome {
                Ok(payload) => {
                    log_debug!("{} succeeded on attempt {}", label, attempt);
                    return JobRun {
                        outcome: Ok(payload),
                        retries,
                        api_requests,
                    };
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                return JobRun {
                    outcome: Err(error),
                    retries,
                    api_requests,
                };
            }

            if attempt == max_attempts {
                return JobRun {
                    outcome: Err(AppError::TransientError(format!(
                        "{} failed after {} attempts: {}",
                        label, attempt, error
                    ))),
                    retries,
                    api_requests,
                };
            }

            retries += 1;
            log_warn!(
                "{} failed (attempt {}/{}): {}; retrying in {}ms",
                label,
                attempt,
                max_attempts,
                error,
                self.config.retry_delay.as_millis()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_delay) => {}
                _ = cancel.cancelled() => {
                    return JobRun {
                        outcome: Err(AppError::Cancelled(format!("{} retry abandoned", label))),
                        retries,
                        api_requests,
                    };
                }
            }
        }

        JobRun {
            outcome: Err(AppError::InternalError(format!("{} was never attempted", label))),
            retries,
            api_requests,
        }
    }

    /// Fetch and parse one page of rankings
    pub async fn process_batch(&self, batch: &RankingBatch, cancel: &CancellationToken) -> BatchResult {
        let run = self
            .run_job(queries::rankings_job(&batch.combination, batch.page), cancel)
            .await;

        let parsed = run
            .outcome
            .and_then(|payload| RankingsPage::from_response(&payload));

        match parsed {
            Ok(page) => {
                let rankings = page
                    .rankings
                    .into_iter()
                    .take(batch.batch_size as usize)
                    .map(|entry| Ranking::from_entry(&batch.combination, entry))
                    .collect();
                BatchResult {
                    batch: batch.clone(),
                    rankings,
                    has_more_pages: page.has_more_pages,
                    error: None,
                    retries: run.retries,
                    api_requests: run.api_requests,
                }
            }
            Err(error) => BatchResult {
                batch: batch.clone(),
                rankings: Vec::new(),
                has_more_pages: false,
                error: Some(error),
                retries: run.retries,
                api_requests: run.api_requests,
            },
        }
    }
}
