//! Rankings synchronization across all class/spec/dungeon combinations
//!
//! Combinations are driven concurrently, bounded by `batch_concurrency`
//! independently of the worker pool size. A failing combination never stops
//! the others; the run ends with a partial-failure error naming every
//! combination that could not be synced.
use super::batch_processor::BatchProcessor;
use crate::modules::rankings::domain::{RankingBatch, RankingRepository, SyncMetrics};
use crate::shared::config::PipelineConfig;
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::TimedOperation;
use crate::{log_debug, log_info, log_warn};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SyncServiceConfig {
    pub batch_size: u32,
    pub max_pages: u32,
    pub batch_concurrency: usize,
    /// Pause between successive pages of one combination
    pub request_delay: Duration,
    /// Stored rankings younger than this are left alone
    pub update_interval: Duration,
}

impl From<&PipelineConfig> for SyncServiceConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.batch.size,
            max_pages: config.batch.max_pages,
            batch_concurrency: config.sync.batch_concurrency,
            request_delay: config.worker.request_delay(),
            update_interval: config.rankings.update_interval(),
        }
    }
}

/// Result of syncing one combination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinationSync {
    pub counts: EntityCounts,
    pub pages: u32,
    pub retries: u32,
    pub api_requests: u64,
    /// Stored data was fresh, nothing was fetched
    pub fresh: bool,
}

#[derive(Debug)]
pub struct CombinationReport {
    pub combination: Combination,
    pub result: AppResult<CombinationSync>,
}

pub struct SyncService {
    processor: Arc<BatchProcessor>,
    repository: Arc<dyn RankingRepository>,
    config: SyncServiceConfig,
}

/// Quota stops, skipped combinations and cancellations are settled by the
/// caller and are not failed batches
fn is_batch_failure(error: &AppError) -> bool {
    !matches!(
        error,
        AppError::Cancelled(_) | AppError::RateLimited { .. } | AppError::ValidationError(_)
    )
}

impl SyncService {
    pub fn new(
        processor: Arc<BatchProcessor>,
        repository: Arc<dyn RankingRepository>,
        config: SyncServiceConfig,
    ) -> Self {
        Self {
            processor,
            repository,
            config,
        }
    }

    /// Sync every combination and wait for all of them
    pub async fn start_sync(
        self: &Arc<Self>,
        combinations: Vec<Combination>,
        metrics: Arc<SyncMetrics>,
        cancel: CancellationToken,
    ) -> AppResult<()> {
        let timer = TimedOperation::new("rankings sync");
        let total = combinations.len();
        metrics.add_batches(total as u64);
        let mut reports = self.spawn_sync(combinations, Arc::clone(&metrics), cancel);

        let mut failed = Vec::new();
        while let Some(report) = reports.recv().await {
            if let Err(e) = report.result {
                let key = report.combination.key();
                // Without a checkpoint to resume from these end the batch too
                if matches!(e, AppError::RateLimited { .. } | AppError::ValidationError(_)) {
                    metrics.record_error(&key, &e);
                }
                failed.push(format!("{}: {}", key, e));
            }
        }
        metrics.finish();

        let summary = metrics.snapshot();
        timer.finish_with_info(&format!(
            "{} combinations, rankings {}, {} failed",
            total,
            summary.rankings,
            failed.len()
        ));

        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort();
            Err(AppError::PartialFailure { failed })
        }
    }

    /// Start syncing in the background; one report per combination that was
    /// started arrives on the returned channel, in completion order. The
    /// channel closes once every started combination has reported.
    pub fn spawn_sync(
        self: &Arc<Self>,
        combinations: Vec<Combination>,
        metrics: Arc<SyncMetrics>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<CombinationReport> {
        let (tx, rx) = mpsc::channel(combinations.len().max(1));
        let semaphore = Arc::new(Semaphore::new(self.config.batch_concurrency.max(1)));
        let service = Arc::clone(self);

        tokio::spawn(async move {
            for combination in combinations {
                let permit = tokio::select! {
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                    _ = cancel.cancelled() => {
                        log_debug!("Rankings sync cancelled before {}", combination);
                        break;
                    }
                };

                let service = Arc::clone(&service);
                let metrics = Arc::clone(&metrics);
                let cancel = cancel.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = service
                        .sync_combination(&combination, &metrics, &cancel)
                        .await;
                    if let Err(e) = &result {
                        if is_batch_failure(e) {
                            log_warn!("Rankings for {} failed: {}", combination, e);
                            metrics.record_error(&combination.key(), e);
                        }
                    }
                    drop(permit);
                    let _ = tx.send(CombinationReport {
                        combination,
                        result,
                    })
                    .await;
                });
            }
        });

        rx
    }

    /// Fetch every page of one combination and store them together
    pub async fn sync_combination(
        &self,
        combination: &Combination,
        metrics: &SyncMetrics,
        cancel: &CancellationToken,
    ) -> AppResult<CombinationSync> {
        if let Some(last_update) = self.repository.get_last_update(combination).await? {
            let age = (Utc::now() - last_update).to_std().unwrap_or_default();
            if age < self.config.update_interval {
                log_debug!(
                    "Skipping {}: updated {}s ago",
                    combination,
                    age.as_secs()
                );
                metrics.record_fresh_skip();
                return Ok(CombinationSync {
                    fresh: true,
                    ..Default::default()
                });
            }
        }

        let mut outcome = CombinationSync::default();
        let mut rankings = Vec::new();
        let mut batch = RankingBatch::first(combination.clone(), self.config.batch_size);

        loop {
            let result = self.processor.process_batch(&batch, cancel).await;
            outcome.retries += result.retries;
            outcome.api_requests += result.api_requests;
            if let Some(error) = result.error {
                return Err(error);
            }

            outcome.pages += 1;
            rankings.extend(result.rankings);
            if !result.has_more_pages || batch.page >= self.config.max_pages {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.request_delay) => {}
                _ = cancel.cancelled() => {
                    return Err(AppError::Cancelled(format!("{} paging abandoned", combination)));
                }
            }
            batch = batch.next_page();
        }

        let fetched = rankings.len();
        outcome.counts = self.repository.store_rankings(combination, rankings).await?;
        metrics.record_rankings(&combination.key(), outcome.counts);

        log_info!(
            "Rankings for {}: {} fetched over {} page(s), {}",
            combination,
            fetched,
            outcome.pages,
            outcome.counts
        );
        Ok(outcome)
    }
}
