//! Log-report fights referenced by stored rankings
use crate::modules::provider::domain::ReportFights;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Keystone dungeons are run by exactly five players
pub const PARTY_SIZE: usize = 5;

/// A ranked run whose report or build still has to be fetched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FightRef {
    pub report_code: String,
    pub fight_id: i32,
    pub player_name: String,
    pub server_name: String,
}

impl FightRef {
    pub fn key(&self) -> String {
        format!("{}#{}", self.report_code, self.fight_id)
    }
}

impl std::fmt::Display for FightRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{} ({})", self.report_code, self.fight_id, self.player_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub name: String,
    pub server: Option<String>,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_code: String,
    pub fight_id: i32,
    pub encounter_id: i32,
    pub keystone_level: Option<i32>,
    pub duration_ms: i64,
    pub affixes: Vec<i32>,
    pub roster: Vec<RosterMember>,
    pub fetched_at: DateTime<Utc>,
}

impl Report {
    /// Build the report of one fight; a fight that is missing or whose roster
    /// is not a full party is rejected
    pub fn from_fights(fights: &ReportFights, fight_id: i32) -> AppResult<Self> {
        let fight = fights.fight(fight_id).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Report {} has no fight {}",
                fights.code, fight_id
            ))
        })?;

        let roster: Vec<RosterMember> = fights
            .roster(fight)
            .into_iter()
            .map(|actor| RosterMember {
                name: actor.name.clone(),
                server: actor.server.clone(),
                class_name: actor.sub_type.clone(),
            })
            .collect();

        if roster.len() != PARTY_SIZE {
            return Err(AppError::ValidationError(format!(
                "Report {} fight {} has {} players, expected {}",
                fights.code,
                fight_id,
                roster.len(),
                PARTY_SIZE
            )));
        }

        Ok(Self {
            report_code: fights.code.clone(),
            fight_id,
            encounter_id: fight.encounter_id,
            keystone_level: fight.keystone_level,
            duration_ms: (fight.end_time - fight.start_time).max(0),
            affixes: fight.keystone_affixes.clone(),
            roster,
            fetched_at: Utc::now(),
        })
    }
}
