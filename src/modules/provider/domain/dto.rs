//! Typed views of data-source payloads
//!
//! Raw JSON is converted here, at the boundary; anything that does not have
//! the expected shape becomes a `ValidationError`.

use crate::shared::errors::{ApiError, AppResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

fn extract<T: DeserializeOwned>(data: &Value, pointer: &str, what: &str) -> AppResult<T> {
    let node = data
        .pointer(pointer)
        .filter(|node| !node.is_null())
        .ok_or_else(|| ApiError::InvalidResponse {
            message: format!("{} missing at {}", what, pointer),
        })?;

    let parsed = serde_json::from_value(node.clone()).map_err(|e| ApiError::InvalidResponse {
        message: format!("malformed {}: {}", what, e),
    })?;
    Ok(parsed)
}

/// One leaderboard page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub has_more_pages: bool,
    #[serde(default)]
    pub rankings: Vec<RankingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub name: String,
    pub score: f64,
    /// Run duration in milliseconds
    #[serde(default)]
    pub duration: i64,
    /// Keystone level of the run
    #[serde(default)]
    pub bracket_data: Option<i32>,
    #[serde(default)]
    pub faction: Option<i32>,
    pub server: ServerRef,
    pub report: ReportRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerRef {
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRef {
    pub code: String,
    #[serde(rename = "fightID")]
    pub fight_id: i32,
}

impl RankingsPage {
    pub fn from_response(data: &Value) -> AppResult<Self> {
        extract(
            data,
            "/worldData/encounter/characterRankings",
            "character rankings",
        )
    }
}

/// Fights of one report plus the player actors that appear in it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFights {
    pub code: String,
    #[serde(default)]
    pub fights: Vec<FightSummary>,
    #[serde(default)]
    pub master_data: Option<MasterData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightSummary {
    pub id: i32,
    #[serde(rename = "encounterID")]
    pub encounter_id: i32,
    #[serde(default)]
    pub keystone_level: Option<i32>,
    #[serde(default)]
    pub keystone_affixes: Vec<i32>,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub friendly_players: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MasterData {
    #[serde(default)]
    pub actors: Vec<Actor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub server: Option<String>,
    /// Class name for player actors
    #[serde(default)]
    pub sub_type: String,
}

impl ReportFights {
    pub fn from_response(data: &Value) -> AppResult<Self> {
        extract(data, "/reportData/report", "report")
    }

    pub fn fight(&self, fight_id: i32) -> Option<&FightSummary> {
        self.fights.iter().find(|fight| fight.id == fight_id)
    }

    /// Player actors taking part in the fight
    pub fn roster(&self, fight: &FightSummary) -> Vec<&Actor> {
        let actors = self
            .master_data
            .as_ref()
            .map(|m| m.actors.as_slice())
            .unwrap_or_default();
        actors
            .iter()
            .filter(|actor| fight.friendly_players.contains(&actor.id))
            .collect()
    }
}

/// Per-role player details of one fight
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerDetails {
    #[serde(default)]
    pub tanks: Vec<PlayerDetail>,
    #[serde(default)]
    pub healers: Vec<PlayerDetail>,
    #[serde(default)]
    pub dps: Vec<PlayerDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDetail {
    pub name: String,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(rename = "type")]
    pub class_name: String,
    #[serde(default)]
    pub specs: Vec<SpecEntry>,
    #[serde(default)]
    pub combatant_info: Option<CombatantInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecEntry {
    pub spec: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantInfo {
    #[serde(default)]
    pub stats: Value,
    #[serde(default)]
    pub talent_tree: Value,
    #[serde(default)]
    pub gear: Value,
}

impl PlayerDetails {
    pub fn from_response(data: &Value) -> AppResult<Self> {
        extract(
            data,
            "/reportData/report/playerDetails/data/playerDetails",
            "player details",
        )
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerDetail> {
        self.tanks.iter().chain(&self.healers).chain(&self.dps)
    }

    /// Player by name, narrowed by server when the provider reports one
    pub fn find(&self, name: &str, server: &str) -> Option<&PlayerDetail> {
        self.players().find(|player| {
            player.name.eq_ignore_ascii_case(name)
                && player
                    .server
                    .as_deref()
                    .map_or(true, |s| s.eq_ignore_ascii_case(server))
        })
    }
}

impl PlayerDetail {
    pub fn primary_spec(&self) -> Option<&str> {
        self.specs.first().map(|s| s.spec.as_str())
    }
}
