//! Loadout of a ranked player in one fight
use super::report::FightRef;
use crate::modules::provider::domain::dto::PlayerDetail;
use crate::shared::domain::Combination;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub report_code: String,
    pub fight_id: i32,
    pub player_name: String,
    pub server_name: String,
    pub class_name: String,
    pub spec_name: String,
    pub dungeon_id: i32,
    pub talents: Value,
    pub gear: Value,
    pub stats: Value,
    pub extracted_at: DateTime<Utc>,
}

impl Build {
    pub fn from_player(
        combination: &Combination,
        fight: &FightRef,
        player: &PlayerDetail,
    ) -> AppResult<Self> {
        let info = player.combatant_info.as_ref().ok_or_else(|| {
            AppError::ValidationError(format!("No combatant info for {}", fight))
        })?;

        if !player.class_name.eq_ignore_ascii_case(&combination.class_name) {
            return Err(AppError::ValidationError(format!(
                "{} is a {}, expected {}",
                fight, player.class_name, combination.class_name
            )));
        }

        Ok(Self {
            report_code: fight.report_code.clone(),
            fight_id: fight.fight_id,
            player_name: fight.player_name.clone(),
            server_name: fight.server_name.clone(),
            class_name: combination.class_name.clone(),
            spec_name: player
                .primary_spec()
                .unwrap_or(&combination.spec_name)
                .to_string(),
            dungeon_id: combination.dungeon_id,
            talents: info.talent_tree.clone(),
            gear: info.gear.clone(),
            stats: info.stats.clone(),
            extracted_at: Utc::now(),
        })
    }
}
