/// Fixed-size pool of worker tasks executing data-source jobs
///
/// Jobs flow through a bounded queue (submitting to a full queue waits, which
/// is the pipeline's backpressure). Each worker takes a rate-limiter token
/// before every call and sleeps through provider rate limits up to the
/// configured ceiling without picking up another job.
use crate::modules::jobs::domain::{CallOutcome, Job, JobResult, WorkerState};
use crate::modules::provider::DataSourceClient;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::shared::utils::RateLimiter;
use crate::{log_debug, log_info, log_warn};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub num_workers: usize,
    pub queue_capacity: usize,
    /// Longest provider retry-after a worker sleeps through
    pub max_rate_limit_wait: Duration,
}

impl WorkerPoolConfig {
    pub fn from_settings(worker: &crate::shared::config::WorkerConfig) -> Self {
        Self {
            num_workers: worker.num_workers,
            queue_capacity: worker.queue_capacity,
            max_rate_limit_wait: worker.max_rate_limit_wait(),
        }
    }
}

/// Worker pool counters for monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerPoolStats {
    pub active_workers: usize,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub rate_limit_waits: u64,
    pub total_latency_ms: u64,
}

impl WorkerPoolStats {
    pub fn average_latency_ms(&self) -> u64 {
        let finished = self.completed_jobs + self.failed_jobs;
        if finished == 0 {
            0
        } else {
            self.total_latency_ms / finished
        }
    }
}

/// Counters shared by the worker tasks, behind a single lock
#[derive(Default)]
struct StatsTracker {
    inner: Mutex<WorkerPoolStats>,
}

impl StatsTracker {
    fn update(&self, f: impl FnOnce(&mut WorkerPoolStats)) {
        let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
    }

    fn snapshot(&self) -> WorkerPoolStats {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

type Waiters = DashMap<Uuid, oneshot::Sender<JobResult>>;

/// State every worker task shares
struct WorkerContext {
    client: Arc<dyn DataSourceClient>,
    limiter: Arc<RateLimiter>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Job>>,
    waiters: Waiters,
    results: Mutex<Option<mpsc::UnboundedSender<JobResult>>>,
    stats: StatsTracker,
    max_rate_limit_wait: Duration,
}

pub struct WorkerPool {
    config: WorkerPoolConfig,
    context: Arc<WorkerContext>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        client: Arc<dyn DataSourceClient>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let context = Arc::new(WorkerContext {
            client,
            limiter,
            receiver: tokio::sync::Mutex::new(receiver),
            waiters: DashMap::new(),
            results: Mutex::new(None),
            stats: StatsTracker::default(),
            max_rate_limit_wait: config.max_rate_limit_wait,
        });

        Self {
            config,
            context,
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker tasks. `cancel` aborts in-flight calls and fails every
    /// job still queued with a cancellation result.
    pub fn start(&self, cancel: CancellationToken) -> AppResult<()> {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        if !handles.is_empty() {
            return Err(AppError::AlreadyRunning("worker pool".to_string()));
        }

        for worker_id in 0..self.config.num_workers {
            let context = Arc::clone(&self.context);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                run_worker(worker_id, context, cancel).await;
            }));
        }

        log_info!(
            "Worker pool started with {} workers (queue capacity {})",
            self.config.num_workers,
            self.config.queue_capacity
        );
        Ok(())
    }

    /// Enqueue a job, waiting while the queue is full
    pub async fn submit(&self, job: Job) -> AppResult<()> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| AppError::Cancelled("worker pool is stopped".to_string()))?;

        sender
            .send(job)
            .await
            .map_err(|_| AppError::Cancelled("worker pool is stopped".to_string()))
    }

    /// Enqueue a job and wait for its result
    pub async fn submit_and_wait(&self, job: Job, cancel: &CancellationToken) -> AppResult<JobResult> {
        let job_id = job.id;
        let (tx, rx) = oneshot::channel();
        self.context.waiters.insert(job_id, tx);

        let submitted = tokio::select! {
            result = self.submit(job) => result,
            _ = cancel.cancelled() => Err(AppError::Cancelled("job submission abandoned".to_string())),
        };
        if let Err(e) = submitted {
            self.context.waiters.remove(&job_id);
            return Err(e);
        }

        tokio::select! {
            result = rx => result.map_err(|_| {
                AppError::InternalError(format!("worker dropped the result of job {}", job_id))
            }),
            _ = cancel.cancelled() => {
                self.context.waiters.remove(&job_id);
                Err(AppError::Cancelled(format!("stopped waiting for job {}", job_id)))
            }
        }
    }

    /// Receiver of every result no caller is waiting for. Only the first call
    /// gets the receiver; before it is taken such results are discarded.
    pub fn results(&self) -> Option<mpsc::UnboundedReceiver<JobResult>> {
        let mut slot = self.context.results.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Some(rx)
    }

    /// Stop accepting jobs, let the workers drain the queue and wait for them
    pub async fn stop(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();

        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                log_warn!("Worker task ended abnormally: {}", e);
            }
        }

        self.context.results.lock().unwrap_or_else(|e| e.into_inner()).take();

        let stats = self.stats();
        log_info!(
            "Worker pool stopped: completed={}, failed={}, rate_limit_waits={}, avg_latency={}ms",
            stats.completed_jobs,
            stats.failed_jobs,
            stats.rate_limit_waits,
            stats.average_latency_ms()
        );
    }

    pub fn stats(&self) -> WorkerPoolStats {
        self.context.stats.snapshot()
    }

    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }
}

async fn run_worker(worker_id: usize, context: Arc<WorkerContext>, cancel: CancellationToken) {
    log_debug!("Worker {} started", worker_id);

    loop {
        let next = {
            let mut receiver = context.receiver.lock().await;
            tokio::select! {
                job = receiver.recv() => job,
                _ = cancel.cancelled() => None,
            }
        };

        let Some(job) = next else { break };
        let result = execute_job(&context, job, &cancel).await;
        deliver(&context, result);
    }

    if cancel.is_cancelled() {
        // Fail whatever is still queued so no submitter waits forever
        let mut receiver = context.receiver.lock().await;
        while let Ok(job) = receiver.try_recv() {
            deliver(&context, JobResult::cancelled(job));
        }
    }

    log_debug!("Worker {} stopped", worker_id);
}

async fn execute_job(context: &WorkerContext, job: Job, cancel: &CancellationToken) -> JobResult {
    context.stats.update(|s| s.active_workers += 1);
    let started_at = Utc::now();
    let timer = Instant::now();
    let label = job.label();

    let mut state = WorkerState::Idle.begin();
    let mut retries = 0;
    let outcome = loop {
        if let Err(e) = context.limiter.acquire(cancel).await {
            break Err(e);
        }

        let call = tokio::select! {
            result = context.client.execute(&job.query, &job.variables) => result,
            _ = cancel.cancelled() => Err(AppError::Cancelled(format!("{} aborted", label))),
        };

        let call_outcome = match &call {
            Ok(_) => CallOutcome::Succeeded,
            Err(AppError::RateLimited { retry_after }) => CallOutcome::RateLimited {
                retry_after: *retry_after,
            },
            Err(_) => CallOutcome::Failed,
        };

        retries = state.retries();
        state = state.on_call(call_outcome, context.max_rate_limit_wait);
        match state {
            WorkerState::Backoff { delay, .. } => {
                context.stats.update(|s| s.rate_limit_waits += 1);
                LogContext::rate_limit_backoff(&label, retries + 1, delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        break Err(AppError::Cancelled(format!("{} aborted during backoff", label)));
                    }
                }
                state = state.wake();
            }
            _ => break call,
        }
    };

    let latency = timer.elapsed().as_millis() as u64;
    let success = outcome.is_ok();
    context.stats.update(|s| {
        s.active_workers = s.active_workers.saturating_sub(1);
        s.total_latency_ms += latency;
        if success {
            s.completed_jobs += 1;
        } else {
            s.failed_jobs += 1;
        }
    });
    LogContext::api_call(
        &job.job_type.to_string(),
        &label,
        if success { "succeeded" } else { "failed" },
        latency,
    );

    JobResult {
        job,
        outcome,
        started_at,
        ended_at: Utc::now(),
        rate_limit_retries: retries,
    }
}

/// Hand a result to its waiting submitter, or to the shared results queue
fn deliver(context: &WorkerContext, result: JobResult) {
    let result = match context.waiters.remove(&result.job.id) {
        Some((_, waiter)) => match waiter.send(result) {
            Ok(()) => return,
            Err(unclaimed) => unclaimed,
        },
        None => result,
    };

    let results = context.results.lock().unwrap_or_else(|e| e.into_inner());
    match results.as_ref() {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => log_debug!("Discarding unclaimed result of {}", result.job.label()),
    }
}
