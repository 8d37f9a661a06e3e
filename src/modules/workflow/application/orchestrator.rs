//! Sequences the phases of one execution over its checkpoint
//!
//! Every processed combination is marked in the checkpoint and persisted
//! before the next one starts, so a resumed execution never repeats work.
//! Rankings fetches run concurrently through the sync service; the
//! checkpoint is still only touched from this loop.
use crate::modules::metrics::MetricsCollector;
use crate::modules::rankings::application::{CombinationReport, SyncService};
use crate::modules::workflow::domain::{
    Phase, PhaseStep, StepError, StepOutcome, WorkflowRepository, WorkflowState, WorkflowStatus,
};
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::{log_error, log_info, log_warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Phases and combinations one execution covers
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub phases: Vec<Phase>,
    pub combinations: Vec<Combination>,
}

impl ExecutionPlan {
    pub fn total_items(&self) -> i64 {
        (self.phases.len() * self.combinations.len()) as i64
    }
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed,
    /// Quota exhausted; a fresh execution should carry the checkpoint on
    ContinueAsNew { retry_after: Duration },
    Failed(AppError),
}

/// How one phase ended
#[derive(Debug)]
enum PhaseResult {
    Completed,
    /// Combinations that failed and stay unmarked
    Incomplete(Vec<String>),
    RateLimited { retry_after: Duration, key: String },
    Aborted(AppError),
}

pub struct PhaseOrchestrator {
    repository: Arc<dyn WorkflowRepository>,
    sync: Arc<SyncService>,
    steps: HashMap<Phase, Arc<dyn PhaseStep>>,
    phase_timeout: Duration,
}

impl PhaseOrchestrator {
    pub fn new(
        repository: Arc<dyn WorkflowRepository>,
        sync: Arc<SyncService>,
        phase_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            sync,
            steps: HashMap::new(),
            phase_timeout,
        }
    }

    /// Register the step that runs a sequential phase
    pub fn with_step(mut self, step: Arc<dyn PhaseStep>) -> Self {
        self.steps.insert(step.phase(), step);
        self
    }

    pub fn supports(&self, phase: Phase) -> bool {
        phase == Phase::Rankings || self.steps.contains_key(&phase)
    }

    pub async fn execute(
        &self,
        state: &mut WorkflowState,
        plan: &ExecutionPlan,
        metrics: &MetricsCollector,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome {
        state.set_total_items(plan.total_items());
        if let Err(e) = self.persist(state, metrics).await {
            return ExecutionOutcome::Failed(e);
        }

        let mut incomplete = Vec::new();
        for &phase in &plan.phases {
            if state.checkpoint.is_phase_complete(phase) {
                log_info!("Phase {} already complete for {}, skipping", phase, state.id);
                continue;
            }

            state.current_phase = Some(phase);
            log_info!(
                "Workflow {} entering phase {} ({} combinations)",
                state.id,
                phase,
                plan.combinations.len()
            );

            let operation = format!("phase:{}", phase);
            metrics.start_operation(&operation);
            let result = tokio::time::timeout(
                self.phase_timeout,
                self.run_phase(phase, state, plan, metrics, cancel),
            )
            .await;
            metrics.end_operation(&operation);

            let result = match result {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => PhaseResult::Aborted(e),
                Err(_) => PhaseResult::Aborted(AppError::Timeout(format!(
                    "phase {} exceeded {}s",
                    phase,
                    self.phase_timeout.as_secs()
                ))),
            };

            match result {
                PhaseResult::Completed => {
                    state.checkpoint.mark_phase_complete(phase);
                    log_info!("Workflow {} completed phase {}", state.id, phase);
                    if let Err(e) = self.persist(state, metrics).await {
                        return ExecutionOutcome::Failed(e);
                    }
                }
                PhaseResult::Incomplete(failed) => {
                    log_warn!(
                        "Phase {} left {} combination(s) unprocessed",
                        phase,
                        failed.len()
                    );
                    incomplete.extend(failed);
                }
                PhaseResult::RateLimited { retry_after, key } => {
                    return self
                        .suspend(state, metrics, key, retry_after)
                        .await;
                }
                PhaseResult::Aborted(e) => return self.fail(state, metrics, e).await,
            }
        }

        if !incomplete.is_empty() {
            incomplete.sort();
            return self
                .fail(state, metrics, AppError::PartialFailure { failed: incomplete })
                .await;
        }

        state.mark_completed();
        metrics.finish(WorkflowStatus::Completed);
        if let Err(e) = self.persist(state, metrics).await {
            return ExecutionOutcome::Failed(e);
        }
        log_info!(
            "Workflow {} completed: {} items, {} API requests",
            state.id,
            state.items_processed,
            state.api_requests_count
        );
        ExecutionOutcome::Completed
    }

    async fn run_phase(
        &self,
        phase: Phase,
        state: &mut WorkflowState,
        plan: &ExecutionPlan,
        metrics: &MetricsCollector,
        cancel: &CancellationToken,
    ) -> AppResult<PhaseResult> {
        if phase == Phase::Rankings {
            return self.run_rankings(state, plan, metrics, cancel).await;
        }

        let step = self.steps.get(&phase).cloned().ok_or_else(|| {
            AppError::ConfigError(format!("No step registered for phase {}", phase))
        })?;

        let total = plan.combinations.len();
        let mut failed = Vec::new();
        for (index, combination) in plan.combinations.iter().enumerate() {
            let key = combination.key();
            if state.checkpoint.is_processed(phase, &key) {
                continue;
            }
            if cancel.is_cancelled() {
                return Ok(PhaseResult::Aborted(AppError::Cancelled(format!(
                    "{} interrupted before {}",
                    phase, key
                ))));
            }

            state.last_processed_id = Some(key.clone());
            LogContext::phase_progress(phase.as_str(), index + 1, total, &key);

            match step.run(combination, cancel).await {
                Ok(outcome) => {
                    self.complete_unit(state, metrics, phase, &key, outcome.counts, outcome.api_requests)
                        .await?;
                }
                Err(StepError { partial, error }) => {
                    // Stored rows and spent requests count even though the unit stays open
                    self.record_partial(state, metrics, phase, partial).await?;
                    match error {
                        AppError::RateLimited { retry_after } => {
                            return Ok(PhaseResult::RateLimited { retry_after, key });
                        }
                        AppError::ValidationError(reason) => {
                            log_warn!("Skipping {} in {}: {}", key, phase, reason);
                            self.complete_unit(state, metrics, phase, &key, EntityCounts::skipped(1), 0)
                                .await?;
                        }
                        e if e.is_fatal() => return Ok(PhaseResult::Aborted(e)),
                        e => {
                            log_warn!("{} failed for {}: {}", phase, key, e);
                            metrics.record_error();
                            metrics.sync_metrics().record_error(&key, &e);
                            failed.push(format!("{}: {}", key, e));
                        }
                    }
                }
            }
        }

        Ok(if failed.is_empty() {
            PhaseResult::Completed
        } else {
            PhaseResult::Incomplete(failed)
        })
    }

    /// Fetch rankings for every unprocessed combination concurrently and
    /// checkpoint each one as its report arrives
    async fn run_rankings(
        &self,
        state: &mut WorkflowState,
        plan: &ExecutionPlan,
        metrics: &MetricsCollector,
        cancel: &CancellationToken,
    ) -> AppResult<PhaseResult> {
        let pending: Vec<Combination> = plan
            .combinations
            .iter()
            .filter(|c| !state.checkpoint.is_processed(Phase::Rankings, &c.key()))
            .cloned()
            .collect();
        let total = pending.len();
        metrics
            .sync_metrics()
            .set_batches_total(plan.combinations.len() as u64);

        // Stops the sync tasks if this phase is dropped early
        let sync_cancel = cancel.child_token();
        let _guard = sync_cancel.clone().drop_guard();
        let mut reports = self
            .sync
            .spawn_sync(pending, metrics.sync_metrics(), sync_cancel.clone());

        let mut done = 0;
        let mut failed = Vec::new();
        let mut rate_limited: Option<(Duration, String)> = None;
        let mut aborted: Option<AppError> = None;

        while let Some(CombinationReport {
            combination,
            result,
        }) = reports.recv().await
        {
            let key = combination.key();
            done += 1;
            match result {
                Ok(sync) => {
                    let counts = if sync.fresh {
                        EntityCounts::skipped(1)
                    } else {
                        sync.counts
                    };
                    state.last_processed_id = Some(key.clone());
                    LogContext::phase_progress(Phase::Rankings.as_str(), done, total, &key);
                    self.complete_unit(state, metrics, Phase::Rankings, &key, counts, sync.api_requests)
                        .await?;
                }
                Err(AppError::Cancelled(_)) if sync_cancel.is_cancelled() => {}
                Err(AppError::RateLimited { retry_after }) => {
                    if rate_limited.is_none() {
                        log_warn!("Quota exhausted at {}, stopping rankings fetches", key);
                        rate_limited = Some((retry_after, key));
                        sync_cancel.cancel();
                    }
                }
                Err(AppError::ValidationError(reason)) => {
                    log_warn!("Skipping rankings for {}: {}", key, reason);
                    self.complete_unit(state, metrics, Phase::Rankings, &key, EntityCounts::skipped(1), 0)
                        .await?;
                }
                Err(e) if e.is_fatal() => {
                    if aborted.is_none() {
                        aborted = Some(e);
                        sync_cancel.cancel();
                    }
                }
                Err(e) => {
                    metrics.record_error();
                    failed.push(format!("{}: {}", key, e));
                }
            }
        }

        if let Some(e) = aborted {
            return Ok(PhaseResult::Aborted(e));
        }
        if cancel.is_cancelled() {
            return Ok(PhaseResult::Aborted(AppError::Cancelled(
                "rankings phase interrupted".to_string(),
            )));
        }
        if let Some((retry_after, key)) = rate_limited {
            return Ok(PhaseResult::RateLimited { retry_after, key });
        }
        Ok(if failed.is_empty() {
            PhaseResult::Completed
        } else {
            PhaseResult::Incomplete(failed)
        })
    }

    async fn complete_unit(
        &self,
        state: &mut WorkflowState,
        metrics: &MetricsCollector,
        phase: Phase,
        key: &str,
        counts: EntityCounts,
        api_requests: u64,
    ) -> AppResult<()> {
        if !state.checkpoint.mark_processed(phase, key) {
            return Ok(());
        }
        state.add_items(1);
        state.add_api_requests(api_requests);
        metrics.add_items(1);
        metrics.add_api_requests(api_requests);
        metrics.record_phase_counts(phase, counts);
        if phase.is_analysis() {
            metrics.record_analysis_rows(phase, counts.stored());
        }
        self.persist(state, metrics).await
    }

    /// Book what a step stored before it stopped, without closing the unit
    async fn record_partial(
        &self,
        state: &mut WorkflowState,
        metrics: &MetricsCollector,
        phase: Phase,
        partial: StepOutcome,
    ) -> AppResult<()> {
        if partial.is_empty() {
            return Ok(());
        }
        state.add_api_requests(partial.api_requests);
        metrics.add_api_requests(partial.api_requests);
        metrics.record_phase_counts(phase, partial.counts);
        if phase.is_analysis() {
            metrics.record_analysis_rows(phase, partial.counts.stored());
        }
        self.persist(state, metrics).await
    }

    async fn suspend(
        &self,
        state: &mut WorkflowState,
        metrics: &MetricsCollector,
        key: String,
        retry_after: Duration,
    ) -> ExecutionOutcome {
        log_warn!(
            "Workflow {} rate limited at {}; continuing in a new execution after {}s",
            state.id,
            key,
            retry_after.as_secs()
        );
        let message = format!("rate limited at {}", key);
        state.mark_rate_limited(Some(key), message);
        metrics.record_continuation();
        metrics.finish(WorkflowStatus::RateLimited);
        match self.persist(state, metrics).await {
            Ok(()) => ExecutionOutcome::ContinueAsNew { retry_after },
            Err(e) => ExecutionOutcome::Failed(e),
        }
    }

    async fn fail(
        &self,
        state: &mut WorkflowState,
        metrics: &MetricsCollector,
        error: AppError,
    ) -> ExecutionOutcome {
        log_error!("Workflow {} failed: {}", state.id, error);
        if error.needs_intervention() {
            state.mark_halted(error.to_string());
        } else {
            state.mark_failed(error.to_string());
        }
        metrics.record_error();
        metrics.finish(WorkflowStatus::Failed);
        if let Err(e) = self.persist(state, metrics).await {
            log_error!("Could not persist failure of workflow {}: {}", state.id, e);
        }
        ExecutionOutcome::Failed(error)
    }

    async fn persist(&self, state: &mut WorkflowState, metrics: &MetricsCollector) -> AppResult<()> {
        state.performance_metrics = Some(metrics.to_json()?);
        self.repository.update(state).await
    }
}
