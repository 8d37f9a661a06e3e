//! Per-job state machine of a worker task
//!
//! `Idle -> Executing -> (Backoff -> Executing)* -> Idle`. The transitions are
//! pure; the worker loop performs the call and the sleep they ask for.
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Executing { attempt: u32 },
    Backoff { attempt: u32, delay: Duration },
}

/// What a single call against the data source produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Succeeded,
    RateLimited { retry_after: Duration },
    Failed,
}

/// How long to sleep before retrying a rate-limited call, or `None` when the
/// provider asks for longer than the worker is allowed to wait
pub fn backoff_duration(retry_after: Duration, max_wait: Duration) -> Option<Duration> {
    (retry_after <= max_wait).then_some(retry_after)
}

impl WorkerState {
    /// A job was taken from the queue
    pub fn begin(self) -> Self {
        WorkerState::Executing { attempt: 0 }
    }

    /// Result of the call made in the `Executing` state
    pub fn on_call(self, outcome: CallOutcome, max_wait: Duration) -> Self {
        match (self, outcome) {
            (WorkerState::Executing { attempt }, CallOutcome::RateLimited { retry_after }) => {
                match backoff_duration(retry_after, max_wait) {
                    Some(delay) => WorkerState::Backoff { attempt, delay },
                    None => WorkerState::Idle,
                }
            }
            (WorkerState::Executing { .. }, _) => WorkerState::Idle,
            (other, _) => other,
        }
    }

    /// The backoff sleep elapsed
    pub fn wake(self) -> Self {
        match self {
            WorkerState::Backoff { attempt, .. } => WorkerState::Executing {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    /// Rate-limit retries performed so far for the current job
    pub fn retries(&self) -> u32 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Executing { attempt } | WorkerState::Backoff { attempt, .. } => *attempt,
        }
    }
}
