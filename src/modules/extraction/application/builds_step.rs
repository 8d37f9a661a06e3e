//! Builds phase: extract the ranked player's loadout from each stored report
use crate::modules::extraction::domain::{Build, BuildRepository};
use crate::modules::provider::domain::{queries, PlayerDetails};
use crate::modules::rankings::application::BatchProcessor;
use crate::modules::workflow::domain::{Phase, PhaseStep, StepError, StepOutcome, StepResult};
use crate::shared::domain::Combination;
use crate::shared::errors::AppError;
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct BuildsStep {
    processor: Arc<BatchProcessor>,
    repository: Arc<dyn BuildRepository>,
}

impl BuildsStep {
    pub fn new(processor: Arc<BatchProcessor>, repository: Arc<dyn BuildRepository>) -> Self {
        Self {
            processor,
            repository,
        }
    }
}

#[async_trait]
impl PhaseStep for BuildsStep {
    fn phase(&self) -> Phase {
        Phase::Builds
    }

    async fn run(&self, combination: &Combination, cancel: &CancellationToken) -> StepResult {
        let fights = self.repository.fights_without_builds(combination).await?;
        if fights.is_empty() {
            log_debug!("No builds to extract for {}", combination);
            return Ok(StepOutcome::default());
        }

        let mut outcome = StepOutcome::default();
        let mut builds = Vec::with_capacity(fights.len());
        let mut failure = None;

        for fight in &fights {
            let run = self
                .processor
                .run_job(queries::player_details_job(&fight.report_code, fight.fight_id), cancel)
                .await;
            outcome.api_requests += run.api_requests;

            let extracted = run
                .outcome
                .and_then(|payload| PlayerDetails::from_response(&payload))
                .and_then(|details| {
                    let player = details
                        .find(&fight.player_name, &fight.server_name)
                        .ok_or_else(|| {
                            AppError::ValidationError(format!("{} not found in report", fight))
                        })?;
                    Build::from_player(combination, fight, player)
                });

            match extracted {
                Ok(build) => builds.push(build),
                Err(AppError::ValidationError(reason)) => {
                    log_warn!("Skipping build {}: {}", fight, reason);
                    outcome.counts.skipped += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let extracted = builds.len();
        if !builds.is_empty() {
            match self.repository.store_builds(builds).await {
                Ok(counts) => outcome.counts += counts,
                Err(e) => return Err(StepError::new(outcome, e)),
            }
        }
        if let Some(e) = failure {
            return Err(StepError::new(outcome, e));
        }

        log_info!(
            "Builds for {}: {} extracted, {}",
            combination,
            extracted,
            outcome.counts
        );
        Ok(outcome)
    }
}
