use super::phase::Phase;
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::AppError;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What one combination contributed to a phase
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    pub counts: EntityCounts,
    pub api_requests: u64,
}

impl StepOutcome {
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty() && self.api_requests == 0
    }
}

/// A step that stopped partway through a combination. `partial` holds what
/// was already stored and the requests already spent.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct StepError {
    pub partial: StepOutcome,
    pub error: AppError,
}

impl StepError {
    pub fn new(partial: StepOutcome, error: AppError) -> Self {
        Self { partial, error }
    }
}

impl From<AppError> for StepError {
    fn from(error: AppError) -> Self {
        Self::new(StepOutcome::default(), error)
    }
}

pub type StepResult = Result<StepOutcome, StepError>;

/// Per-combination work of one sequential phase
///
/// A `RateLimited` error hands control back to the orchestrator, which
/// persists the checkpoint and continues in a fresh execution.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PhaseStep: Send + Sync {
    fn phase(&self) -> Phase;

    async fn run(&self, combination: &Combination, cancel: &CancellationToken) -> StepResult;
}
