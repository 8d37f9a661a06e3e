//! Starts executions per scope and chains continuations
//!
//! A scope has at most one active chain. When an execution stops on an
//! exhausted quota, a new workflow row is created from its checkpoint and a
//! fresh execution is spawned after the provider's retry-after; the old
//! execution ends without waiting for it.
use super::orchestrator::{ExecutionOutcome, ExecutionPlan, PhaseOrchestrator};
use crate::modules::metrics::{estimate_completion, MetricsCollector, MetricsSnapshot};
use crate::modules::scheduler::application::ScopeRunner;
use crate::modules::scheduler::domain::ScheduleScope;
use crate::modules::workflow::domain::{
    WorkflowFilter, WorkflowRepository, WorkflowState, WorkflowStatistics, WorkflowStatus,
    WorkflowType,
};
use crate::shared::config::PipelineConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_error, log_info, log_warn};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Pause before a continuation when the provider gave no retry-after
    pub continuation_delay: Duration,
    pub retention_days: i64,
}

impl From<&PipelineConfig> for RunnerConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            continuation_delay: config.workflow.continuation_delay(),
            retention_days: config.workflow.retention_days,
        }
    }
}

/// How one execution ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(WorkflowState),
    Failed(WorkflowState),
    /// The chain goes on in a new execution
    Continued(ExecutionHandle),
}

/// A spawned execution
#[derive(Debug)]
pub struct ExecutionHandle {
    pub workflow_id: Uuid,
    handle: JoinHandle<AppResult<RunOutcome>>,
}

impl ExecutionHandle {
    pub async fn wait(self) -> AppResult<RunOutcome> {
        self.handle.await?
    }

    /// Follow continuations until the chain completes or fails
    pub async fn wait_chain(self) -> AppResult<WorkflowState> {
        let mut current = self;
        loop {
            match current.wait().await? {
                RunOutcome::Completed(state) | RunOutcome::Failed(state) => return Ok(state),
                RunOutcome::Continued(next) => current = next,
            }
        }
    }
}

struct RunnerInner {
    orchestrator: PhaseOrchestrator,
    repository: Arc<dyn WorkflowRepository>,
    pipeline: PipelineConfig,
    config: RunnerConfig,
    /// Scope name to the id of its currently running execution
    active: DashMap<String, Uuid>,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct WorkflowRunner {
    inner: Arc<RunnerInner>,
}

impl WorkflowRunner {
    pub fn new(
        orchestrator: PhaseOrchestrator,
        repository: Arc<dyn WorkflowRepository>,
        pipeline: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        let config = RunnerConfig::from(&pipeline);
        Self {
            inner: Arc::new(RunnerInner {
                orchestrator,
                repository,
                pipeline,
                config,
                active: DashMap::new(),
                cancel,
            }),
        }
    }

    fn workflow_type(scope: &ScheduleScope) -> WorkflowType {
        match scope {
            ScheduleScope::Rankings => WorkflowType::Rankings,
            ScheduleScope::Class(_) => WorkflowType::Extraction,
            ScheduleScope::Analysis(phase) => WorkflowType::Analysis(*phase),
        }
    }

    pub fn plan_for(&self, scope: &ScheduleScope) -> AppResult<ExecutionPlan> {
        let phases = scope.phases();
        if let Some(phase) = phases.iter().find(|p| !self.inner.orchestrator.supports(**p)) {
            return Err(AppError::ConfigError(format!(
                "Scope {} needs phase {} which has no step",
                scope, phase
            )));
        }

        let combinations = self.inner.pipeline.combinations(scope.class_filter());
        if combinations.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Scope {} has no combinations",
                scope
            )));
        }
        Ok(ExecutionPlan {
            phases,
            combinations,
        })
    }

    /// Start the scope, continuing its newest unfinished run if there is one.
    /// Rejected while another execution of the scope is active.
    pub async fn run_scope(
        &self,
        scope: &ScheduleScope,
        timeout: Option<Duration>,
    ) -> AppResult<ExecutionHandle> {
        let name = scope.name();
        match self.inner.active.entry(name.clone()) {
            Entry::Occupied(_) => return Err(AppError::AlreadyRunning(name)),
            Entry::Vacant(slot) => {
                slot.insert(Uuid::nil());
            }
        }

        match self.prepare(scope).await {
            Ok(state) => {
                self.inner.active.insert(name, state.id);
                Ok(self.spawn_execution(scope.clone(), state, Duration::ZERO, timeout))
            }
            Err(e) => {
                self.inner.active.remove_if(&name, |_, id| id.is_nil());
                Err(e)
            }
        }
    }

    async fn prepare(&self, scope: &ScheduleScope) -> AppResult<WorkflowState> {
        let plan = self.plan_for(scope)?;
        let workflow_type = Self::workflow_type(scope);
        let class_name = scope.class_filter();

        let state = match self
            .inner
            .repository
            .find_resumable(workflow_type, class_name)
            .await?
        {
            Some(mut previous) => {
                if previous.status == WorkflowStatus::Running {
                    previous.mark_failed("interrupted");
                    self.inner.repository.update(&previous).await?;
                }
                log_info!(
                    "Resuming {} from workflow {} ({} of {} items done)",
                    scope,
                    previous.id,
                    previous.items_processed,
                    previous.total_items
                );
                previous.continuation()
            }
            None => WorkflowState::new(
                workflow_type,
                class_name.map(str::to_string),
                plan.total_items(),
            ),
        };

        self.inner.repository.create(&state).await?;
        Ok(state)
    }

    /// Create the next execution of a chain from `state` and spawn it after
    /// `delay`
    pub async fn resume_from(
        &self,
        scope: &ScheduleScope,
        state: &WorkflowState,
        delay: Duration,
        timeout: Option<Duration>,
    ) -> AppResult<ExecutionHandle> {
        let next = state.continuation();
        self.inner.repository.create(&next).await?;
        self.inner.active.insert(scope.name(), next.id);

        log_info!(
            "Continuation {} of {} created as {} (starts in {}s)",
            next.continuation_count,
            scope,
            next.id,
            delay.as_secs()
        );
        Ok(self.spawn_execution(scope.clone(), next, delay, timeout))
    }

    fn spawn_execution(
        &self,
        scope: ScheduleScope,
        state: WorkflowState,
        delay: Duration,
        timeout: Option<Duration>,
    ) -> ExecutionHandle {
        let workflow_id = state.id;
        let handle = tokio::spawn(self.clone().execute(scope, state, delay, timeout));
        ExecutionHandle {
            workflow_id,
            handle,
        }
    }

    fn execute(
        self,
        scope: ScheduleScope,
        mut state: WorkflowState,
        delay: Duration,
        timeout: Option<Duration>,
    ) -> BoxFuture<'static, AppResult<RunOutcome>> {
        async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.inner.cancel.cancelled() => {
                        state.mark_failed("cancelled before the continuation started");
                        let saved = self.inner.repository.update(&state).await;
                        self.release(&scope, state.id);
                        saved?;
                        return Ok(RunOutcome::Failed(state));
                    }
                }
            }

            let plan = match self.plan_for(&scope) {
                Ok(plan) => plan,
                Err(e) => {
                    state.mark_failed(e.to_string());
                    let saved = self.inner.repository.update(&state).await;
                    self.release(&scope, state.id);
                    saved?;
                    return Ok(RunOutcome::Failed(state));
                }
            };

            let metrics = MetricsCollector::resume(
                &state.workflow_type.as_string(),
                state.performance_metrics.as_ref(),
            );
            let execution = self
                .inner
                .orchestrator
                .execute(&mut state, &plan, &metrics, &self.inner.cancel);
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, execution).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let error = AppError::Timeout(format!(
                            "execution of {} exceeded {}s",
                            scope,
                            limit.as_secs()
                        ));
                        state.mark_failed(error.to_string());
                        metrics.finish(WorkflowStatus::Failed);
                        state.performance_metrics = metrics.to_json().ok();
                        if let Err(e) = self.inner.repository.update(&state).await {
                            log_error!("Could not persist timeout of {}: {}", state.id, e);
                        }
                        ExecutionOutcome::Failed(error)
                    }
                },
                None => execution.await,
            };

            match outcome {
                ExecutionOutcome::Completed => {
                    self.release(&scope, state.id);
                    Ok(RunOutcome::Completed(state))
                }
                ExecutionOutcome::Failed(e) => {
                    log_warn!("{} ended failed: {}", scope, e);
                    self.release(&scope, state.id);
                    Ok(RunOutcome::Failed(state))
                }
                ExecutionOutcome::ContinueAsNew { retry_after } => {
                    let delay = if retry_after.is_zero() {
                        self.inner.config.continuation_delay
                    } else {
                        retry_after
                    };
                    match self.resume_from(&scope, &state, delay, timeout).await {
                        Ok(next) => Ok(RunOutcome::Continued(next)),
                        Err(e) => {
                            log_error!("Could not continue {}: {}", scope, e);
                            self.release(&scope, state.id);
                            Err(e)
                        }
                    }
                }
            }
        }
        .boxed()
    }

    fn release(&self, scope: &ScheduleScope, workflow_id: Uuid) {
        self.inner
            .active
            .remove_if(&scope.name(), |_, id| *id == workflow_id);
    }

    pub fn is_active(&self, scope: &ScheduleScope) -> bool {
        self.inner.active.contains_key(&scope.name())
    }

    /// Id of the execution currently running for the scope
    pub fn active_execution(&self, scope: &ScheduleScope) -> Option<Uuid> {
        self.inner
            .active
            .get(&scope.name())
            .map(|id| *id)
            .filter(|id| !id.is_nil())
    }

    pub async fn get_statistics(&self, workflow_id: Uuid) -> AppResult<WorkflowStatistics> {
        let state = self
            .inner
            .repository
            .get_by_id(workflow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workflow {}", workflow_id)))?;

        let estimated_completion = match state.status {
            WorkflowStatus::Completed => state.completed_at,
            WorkflowStatus::Failed => None,
            WorkflowStatus::Running | WorkflowStatus::RateLimited => state
                .performance_metrics
                .as_ref()
                .and_then(|blob| serde_json::from_value::<MetricsSnapshot>(blob.clone()).ok())
                .and_then(|snapshot| snapshot.start_time)
                .and_then(|start| estimate_completion(start, Utc::now(), state.progress())),
        };

        Ok(WorkflowStatistics {
            workflow_id: state.id,
            status: state.status,
            progress_percentage: state.progress(),
            items_processed: state.items_processed,
            total_items: state.total_items,
            continuation_count: state.continuation_count,
            estimated_completion,
        })
    }

    pub async fn history(&self, filter: &WorkflowFilter) -> AppResult<Vec<WorkflowState>> {
        self.inner.repository.list(filter).await
    }

    /// Delete finished rows older than the retention period
    pub async fn prune_history(&self) -> AppResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(self.inner.config.retention_days);
        let deleted = self.inner.repository.delete_finished_before(cutoff).await?;
        if deleted > 0 {
            log_info!("Pruned {} workflow rows finished before {}", deleted, cutoff);
        }
        Ok(deleted)
    }

    /// Cancel every running execution; their states are persisted as failed
    pub fn shutdown(&self) {
        log_info!(
            "Stopping workflow runner ({} active scope(s))",
            self.inner.active.len()
        );
        self.inner.cancel.cancel();
    }
}

#[async_trait]
impl ScopeRunner for WorkflowRunner {
    async fn trigger(&self, scope: &ScheduleScope, timeout: Option<Duration>) -> AppResult<Uuid> {
        let handle = self.run_scope(scope, timeout).await?;
        Ok(handle.workflow_id)
    }

    fn is_running(&self, scope: &ScheduleScope) -> bool {
        self.is_active(scope)
    }
}
