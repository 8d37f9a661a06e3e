use crate::modules::provider::domain::dto::RankingEntry;
use crate::shared::domain::Combination;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One leaderboard entry for a class/spec in a dungeon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub class_name: String,
    pub spec_name: String,
    pub dungeon_id: i32,
    pub player_name: String,
    pub server_name: String,
    pub region: String,
    pub score: f64,
    pub duration_ms: i64,
    pub keystone_level: i32,
    pub report_code: String,
    pub fight_id: i32,
    pub faction: Option<i32>,
    pub fetched_at: DateTime<Utc>,
}

impl Ranking {
    pub fn from_entry(combination: &Combination, entry: RankingEntry) -> Self {
        Self {
            class_name: combination.class_name.clone(),
            spec_name: combination.spec_name.clone(),
            dungeon_id: combination.dungeon_id,
            player_name: entry.name,
            server_name: entry.server.name,
            region: entry.server.region,
            score: entry.score,
            duration_ms: entry.duration,
            keystone_level: entry.bracket_data.unwrap_or_default(),
            report_code: entry.report.code,
            fight_id: entry.report.fight_id,
            faction: entry.faction,
            fetched_at: Utc::now(),
        }
    }

    /// Identity of the ranked character within its combination
    pub fn player_key(&self) -> (String, String, String) {
        (
            self.player_name.to_lowercase(),
            self.server_name.to_lowercase(),
            self.region.to_lowercase(),
        )
    }

    /// Same ranked run, ignoring when it was fetched
    pub fn same_run(&self, other: &Ranking) -> bool {
        self.score == other.score
            && self.duration_ms == other.duration_ms
            && self.keystone_level == other.keystone_level
            && self.report_code == other.report_code
            && self.fight_id == other.fight_id
    }
}
