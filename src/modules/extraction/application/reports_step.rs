//! Reports phase: fetch the fights behind stored rankings
use crate::modules::extraction::domain::{Report, ReportRepository};
use crate::modules::provider::domain::{queries, ReportFights};
use crate::modules::rankings::application::BatchProcessor;
use crate::modules::workflow::domain::{Phase, PhaseStep, StepError, StepOutcome, StepResult};
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct ReportsStep {
    processor: Arc<BatchProcessor>,
    repository: Arc<dyn ReportRepository>,
}

impl ReportsStep {
    pub fn new(processor: Arc<BatchProcessor>, repository: Arc<dyn ReportRepository>) -> Self {
        Self {
            processor,
            repository,
        }
    }

    async fn store(&self, reports: Vec<Report>, counts: &mut EntityCounts) -> AppResult<()> {
        if !reports.is_empty() {
            *counts += self.repository.store_reports(reports).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PhaseStep for ReportsStep {
    fn phase(&self) -> Phase {
        Phase::Reports
    }

    async fn run(&self, combination: &Combination, cancel: &CancellationToken) -> StepResult {
        let mut fights = self.repository.missing_reports(combination).await?;
        let mut seen = HashSet::new();
        fights.retain(|fight| seen.insert(fight.key()));

        let mut outcome = StepOutcome::default();
        let mut reports = Vec::with_capacity(fights.len());

        for fight in &fights {
            let run = self
                .processor
                .run_job(queries::report_fights_job(&fight.report_code, fight.fight_id), cancel)
                .await;
            outcome.api_requests += run.api_requests;

            let parsed = run
                .outcome
                .and_then(|payload| ReportFights::from_response(&payload))
                .and_then(|fights| Report::from_fights(&fights, fight.fight_id));

            match parsed {
                Ok(report) => reports.push(report),
                Err(AppError::ValidationError(reason)) => {
                    log_warn!("Skipping report {}: {}", fight, reason);
                    outcome.counts.skipped += 1;
                }
                Err(e) => {
                    // Keep what was fetched; the fight stays missing for the next attempt
                    let error = match self.store(reports, &mut outcome.counts).await {
                        Ok(()) => e,
                        Err(store_error) => store_error,
                    };
                    return Err(StepError::new(outcome, error));
                }
            }
        }

        let fetched = reports.len();
        if let Err(e) = self.store(reports, &mut outcome.counts).await {
            return Err(StepError::new(outcome, e));
        }

        if fights.is_empty() {
            log_debug!("No missing reports for {}", combination);
        } else {
            log_info!(
                "Reports for {}: {} fetched, {}",
                combination,
                fetched,
                outcome.counts
            );
        }
        Ok(outcome)
    }
}
