use super::build::Build;
use super::report::{FightRef, Report};
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::AppResult;
use async_trait::async_trait;

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Ranked fights of the combination whose report is not stored yet
    async fn missing_reports(&self, combination: &Combination) -> AppResult<Vec<FightRef>>;

    /// Insert reports; already stored fights count as unchanged
    async fn store_reports(&self, reports: Vec<Report>) -> AppResult<EntityCounts>;
}

#[async_trait]
pub trait BuildRepository: Send + Sync {
    /// Ranked fights of the combination with a stored report but no build
    async fn fights_without_builds(&self, combination: &Combination) -> AppResult<Vec<FightRef>>;

    /// Insert or refresh builds keyed by report, fight and player
    async fn store_builds(&self, builds: Vec<Build>) -> AppResult<EntityCounts>;
}
