use crate::modules::scheduler::domain::{OverlapPolicy, ScheduleConfig, ScheduleScope};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_error, log_info, log_warn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Starts the work of a scope
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScopeRunner: Send + Sync {
    /// Start (or resume) the scope; returns the id of the new execution
    async fn trigger(&self, scope: &ScheduleScope, timeout: Option<Duration>) -> AppResult<Uuid>;

    fn is_running(&self, scope: &ScheduleScope) -> bool;
}

/// Operator view of one schedule entry
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub scope: String,
    pub cron: String,
    pub timezone: String,
    pub paused: bool,
    pub running: bool,
    pub next_run: Option<DateTime<Utc>>,
}

struct ScheduleEntry {
    config: ScheduleConfig,
    job_id: Option<Uuid>,
}

pub struct SchedulerService {
    scheduler: JobScheduler,
    runner: Arc<dyn ScopeRunner>,
    entries: Mutex<HashMap<ScheduleScope, ScheduleEntry>>,
}

impl SchedulerService {
    pub async fn new(runner: Arc<dyn ScopeRunner>) -> AppResult<Self> {
        Ok(Self {
            scheduler: JobScheduler::new().await?,
            runner,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Add or replace the schedule of a scope. Paused entries are kept but
    /// not handed to the cron scheduler.
    pub async fn register(&self, scope: ScheduleScope, config: ScheduleConfig) -> AppResult<()> {
        let previous = self.with_entries(|entries| entries.remove(&scope));
        if let Some(job_id) = previous.and_then(|entry| entry.job_id) {
            self.scheduler.remove(&job_id).await?;
        }

        let job_id = if config.paused {
            None
        } else {
            Some(self.schedule_job(&scope, &config).await?)
        };

        log_info!(
            "Registered schedule {} ({} {}){}",
            scope,
            config.cron,
            config.timezone,
            if config.paused { " paused" } else { "" }
        );
        self.with_entries(|entries| entries.insert(scope, ScheduleEntry { config, job_id }));
        Ok(())
    }

    async fn schedule_job(&self, scope: &ScheduleScope, config: &ScheduleConfig) -> AppResult<Uuid> {
        let runner = Arc::clone(&self.runner);
        let job_scope = scope.clone();
        let job_config = config.clone();

        let job = Job::new_async_tz(config.cron.as_str(), config.timezone, move |_uuid, _lock| {
            let runner = Arc::clone(&runner);
            let scope = job_scope.clone();
            let config = job_config.clone();
            Box::pin(async move {
                log_info!("Schedule {} fired", scope);
                if let Err(e) = fire(runner.as_ref(), &scope, &config).await {
                    log_warn!("Scheduled run of {} not started: {}", scope, e);
                }
            })
        })
        .map_err(|e| {
            AppError::SchedulerError(format!("Invalid cron '{}' for {}: {}", config.cron, scope, e))
        })?;

        Ok(self.scheduler.add(job).await?)
    }

    pub async fn start(&self) -> AppResult<()> {
        self.scheduler.start().await?;
        log_info!("Scheduler started with {} schedule(s)", self.len());
        Ok(())
    }

    pub async fn shutdown(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        log_info!("Scheduler stopped");
        Ok(())
    }

    /// Stop automatic triggering of the scope
    pub async fn pause(&self, scope: &ScheduleScope) -> AppResult<()> {
        let job_id = self.with_entries(|entries| {
            let entry = entries
                .get_mut(scope)
                .ok_or_else(|| AppError::NotFound(format!("Schedule {}", scope)))?;
            entry.config.paused = true;
            Ok::<_, AppError>(entry.job_id.take())
        })?;

        if let Some(job_id) = job_id {
            self.scheduler.remove(&job_id).await?;
        }
        log_info!("Paused schedule {}", scope);
        Ok(())
    }

    pub async fn unpause(&self, scope: &ScheduleScope) -> AppResult<()> {
        let config = self.with_entries(|entries| {
            let entry = entries
                .get_mut(scope)
                .ok_or_else(|| AppError::NotFound(format!("Schedule {}", scope)))?;
            if !entry.config.paused {
                return Ok(None);
            }
            entry.config.paused = false;
            Ok::<_, AppError>(Some(entry.config.clone()))
        })?;

        let Some(config) = config else {
            log_debug!("Schedule {} is not paused", scope);
            return Ok(());
        };

        let job_id = self.schedule_job(scope, &config).await?;
        self.with_entries(|entries| {
            if let Some(entry) = entries.get_mut(scope) {
                entry.job_id = Some(job_id);
            }
        });
        log_info!("Unpaused schedule {}", scope);
        Ok(())
    }

    /// Remove the schedule entirely
    pub async fn delete(&self, scope: &ScheduleScope) -> AppResult<()> {
        let entry = self
            .with_entries(|entries| entries.remove(scope))
            .ok_or_else(|| AppError::NotFound(format!("Schedule {}", scope)))?;
        if let Some(job_id) = entry.job_id {
            self.scheduler.remove(&job_id).await?;
        }
        log_info!("Deleted schedule {}", scope);
        Ok(())
    }

    /// Start the scope now, whether or not its schedule is paused
    pub async fn trigger_now(&self, scope: &ScheduleScope) -> AppResult<Uuid> {
        let config = self
            .with_entries(|entries| entries.get(scope).map(|entry| entry.config.clone()))
            .ok_or_else(|| AppError::NotFound(format!("Schedule {}", scope)))?;
        log_info!("Manual trigger of {}", scope);
        fire(self.runner.as_ref(), scope, &config).await
    }

    pub async fn list(&self) -> Vec<ScheduleInfo> {
        let entries: Vec<(ScheduleScope, ScheduleConfig, Option<Uuid>)> = self.with_entries(|entries| {
            entries
                .iter()
                .map(|(scope, entry)| (scope.clone(), entry.config.clone(), entry.job_id))
                .collect()
        });

        let mut scheduler = self.scheduler.clone();
        let mut infos = Vec::with_capacity(entries.len());
        for (scope, config, job_id) in entries {
            let next_run = match job_id {
                Some(job_id) => scheduler.next_tick_for_job(job_id).await.ok().flatten(),
                None => None,
            };
            infos.push(ScheduleInfo {
                scope: scope.name(),
                cron: config.cron,
                timezone: config.timezone.to_string(),
                paused: config.paused,
                running: self.runner.is_running(&scope),
                next_run,
            });
        }
        infos.sort_by(|a, b| a.scope.cmp(&b.scope));
        infos
    }

    pub fn is_paused(&self, scope: &ScheduleScope) -> Option<bool> {
        self.with_entries(|entries| entries.get(scope).map(|entry| entry.config.paused))
    }

    pub fn len(&self) -> usize {
        self.with_entries(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<ScheduleScope, ScheduleEntry>) -> R) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut entries)
    }
}

/// Start one run of the scope, honoring the overlap policy and retrying
/// failures to start with the schedule's backoff
pub async fn fire(
    runner: &dyn ScopeRunner,
    scope: &ScheduleScope,
    config: &ScheduleConfig,
) -> AppResult<Uuid> {
    if config.overlap == OverlapPolicy::Skip && runner.is_running(scope) {
        return Err(AppError::AlreadyRunning(scope.name()));
    }

    let max_attempts = config.retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match runner.trigger(scope, Some(config.timeout)).await {
            Ok(workflow_id) => {
                log_info!("Started {} as workflow {}", scope, workflow_id);
                return Ok(workflow_id);
            }
            Err(e @ AppError::AlreadyRunning(_)) => return Err(e),
            Err(e) if e.is_fatal() || attempt >= max_attempts => {
                log_error!("Could not start {} after {} attempt(s): {}", scope, attempt, e);
                return Err(e);
            }
            Err(e) => {
                let delay = config.retry.delay_for(attempt);
                log_warn!(
                    "Starting {} failed (attempt {}/{}): {}; retrying in {}s",
                    scope,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
