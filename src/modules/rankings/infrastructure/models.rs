/// Diesel models for the player_rankings table
use crate::modules::rankings::domain::Ranking;
use crate::schema::player_rankings;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = player_rankings)]
pub struct RankingModel {
    pub id: Uuid,
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

#[derive(Insertable, Debug)]
#[diesel(table_name = player_rankings)]
pub struct NewRanking {
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

impl From<RankingModel> for Ranking {
    fn from(model: RankingModel) -> Self {
        Self {
            class_name: model.class_name,
            spec_name: model.spec_name,
            dungeon_id: model.dungeon_id,
            player_name: model.player_name,
            server_name: model.server_name,
            region: model.region,
            score: model.score,
            duration_ms: model.duration_ms,
            keystone_level: model.keystone_level,
            report_code: model.report_code,
            fight_id: model.fight_id,
            faction: model.faction,
            fetched_at: model.fetched_at,
        }
    }
}

impl From<Ranking> for NewRanking {
    fn from(ranking: Ranking) -> Self {
        Self {
            class_name: ranking.class_name,
            spec_name: ranking.spec_name,
            dungeon_id: ranking.dungeon_id,
            player_name: ranking.player_name,
            server_name: ranking.server_name,
            region: ranking.region,
            score: ranking.score,
            duration_ms: ranking.duration_ms,
            keystone_level: ranking.keystone_level,
            report_code: ranking.report_code,
            fight_id: ranking.fight_id,
            faction: ranking.faction,
            fetched_at: ranking.fetched_at,
        }
    }
}
