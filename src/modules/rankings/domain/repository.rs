use super::ranking::Ranking;
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// When the rankings of the combination were last stored
    async fn get_last_update(&self, combination: &Combination) -> AppResult<Option<DateTime<Utc>>>;

    /// Replace the stored rankings of the combination with `rankings`
    async fn store_rankings(
        &self,
        combination: &Combination,
        rankings: Vec<Ranking>,
    ) -> AppResult<EntityCounts>;

    async fn list_rankings(&self, combination: &Combination) -> AppResult<Vec<Ranking>>;
}

/// Classify a replacement of `existing` by `incoming`
pub fn diff_rankings(existing: &[Ranking], incoming: &[Ranking]) -> EntityCounts {
    let mut counts = EntityCounts::default();
    for ranking in incoming {
        match existing
            .iter()
            .find(|old| old.player_key() == ranking.player_key())
        {
            None => counts.new += 1,
            Some(old) if old.same_run(ranking) => counts.unchanged += 1,
            Some(_) => counts.updated += 1,
        }
    }
    counts.deleted = existing
        .iter()
        .filter(|old| !incoming.iter().any(|r| r.player_key() == old.player_key()))
        .count() as u64;
    counts
}
