//! GraphQL query templates and the jobs built from them

use crate::modules::jobs::domain::{Job, JobType};
use crate::shared::domain::Combination;
use serde_json::json;

/// One leaderboard page for a class/spec in a dungeon
pub const CHARACTER_RANKINGS_QUERY: &str = r#"
query ($encounterId: Int!, $className: String!, $specName: String!, $page: Int!) {
  worldData {
    encounter(id: $encounterId) {
      characterRankings(className: $className, specName: $specName, page: $page, metric: playerscore)
    }
  }
}
"#;

/// Fight metadata and the friendly roster of one report fight
pub const REPORT_FIGHTS_QUERY: &str = r#"
query ($code: String!, $fightIds: [Int]!) {
  reportData {
    report(code: $code) {
      code
      fights(fightIDs: $fightIds) {
        id
        encounterID
        keystoneLevel
        keystoneAffixes
        startTime
        endTime
        friendlyPlayers
      }
      masterData {
        actors(type: "Player") {
          id
          name
          server
          subType
        }
      }
    }
  }
}
"#;

/// Talents, gear and stats of every player in one report fight
pub const PLAYER_DETAILS_QUERY: &str = r#"
query ($code: String!, $fightIds: [Int]!) {
  reportData {
    report(code: $code) {
      playerDetails(fightIDs: $fightIds, includeCombatantInfo: true)
    }
  }
}
"#;

pub fn rankings_job(combination: &Combination, page: u32) -> Job {
    Job::new(
        JobType::Rankings,
        CHARACTER_RANKINGS_QUERY,
        json!({
            "encounterId": combination.dungeon_id,
            "className": combination.class_name,
            "specName": combination.spec_name,
            "page": page,
        }),
    )
    .with_metadata("target", format!("{} page {}", combination.key(), page))
}

pub fn report_fights_job(code: &str, fight_id: i32) -> Job {
    Job::new(
        JobType::ReportFights,
        REPORT_FIGHTS_QUERY,
        json!({ "code": code, "fightIds": [fight_id] }),
    )
    .with_metadata("target", format!("{}#{}", code, fight_id))
}

pub fn player_details_job(code: &str, fight_id: i32) -> Job {
    Job::new(
        JobType::PlayerDetails,
        PLAYER_DETAILS_QUERY,
        json!({ "code": code, "fightIds": [fight_id] }),
    )
    .with_metadata("target", format!("{}#{}", code, fight_id))
}
