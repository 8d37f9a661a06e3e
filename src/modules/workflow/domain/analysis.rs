use super::phase::Phase;
use crate::shared::domain::Combination;
use crate::shared::errors::AppResult;
use async_trait::async_trait;

/// Computes the aggregate statistics of one analysis phase for a combination.
/// The aggregation itself lives in the database.
#[async_trait]
pub trait StatisticsAggregator: Send + Sync {
    /// Returns the number of aggregate rows written
    async fn aggregate(&self, phase: Phase, combination: &Combination) -> AppResult<u64>;
}
