use crate::modules::workflow::domain::{
    Phase, PhaseStep, StatisticsAggregator, StepOutcome, StepResult,
};
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::{AppError, AppResult};
use crate::log_debug;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One statistics phase over the stored builds
pub struct AnalysisStep {
    phase: Phase,
    aggregator: Arc<dyn StatisticsAggregator>,
}

impl AnalysisStep {
    pub fn new(phase: Phase, aggregator: Arc<dyn StatisticsAggregator>) -> AppResult<Self> {
        if !phase.is_analysis() {
            return Err(AppError::ConfigError(format!(
                "{} is not an analysis phase",
                phase
            )));
        }
        Ok(Self { phase, aggregator })
    }
}

#[async_trait]
impl PhaseStep for AnalysisStep {
    fn phase(&self) -> Phase {
        self.phase
    }

    async fn run(&self, combination: &Combination, cancel: &CancellationToken) -> StepResult {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(format!("{} for {}", self.phase, combination)).into());
        }

        let rows = self.aggregator.aggregate(self.phase, combination).await?;
        log_debug!("{} for {}: {} rows", self.phase, combination, rows);

        Ok(StepOutcome {
            counts: EntityCounts {
                updated: rows,
                ..Default::default()
            },
            api_requests: 0,
        })
    }
}
