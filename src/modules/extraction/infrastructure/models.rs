use crate::modules::extraction::domain::{Build, Report};
use crate::schema::{player_builds, reports};
use crate::shared::errors::AppResult;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

#[derive(Insertable, Debug)]
#[diesel(table_name = reports)]
pub struct NewReport {
    pub report_code: String,
    pub fight_id: i32,
    pub encounter_id: i32,
    pub keystone_level: Option<i32>,
    pub duration_ms: i64,
    pub affixes: Value,
    pub roster: Value,
    pub fetched_at: DateTime<Utc>,
}

impl NewReport {
    pub fn from_domain(report: Report) -> AppResult<Self> {
        Ok(Self {
            affixes: serde_json::to_value(&report.affixes)?,
            roster: serde_json::to_value(&report.roster)?,
            report_code: report.report_code,
            fight_id: report.fight_id,
            encounter_id: report.encounter_id,
            keystone_level: report.keystone_level,
            duration_ms: report.duration_ms,
            fetched_at: report.fetched_at,
        })
    }
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = player_builds)]
pub struct NewBuild {
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

impl From<Build> for NewBuild {
    fn from(build: Build) -> Self {
        Self {
            report_code: build.report_code,
            fight_id: build.fight_id,
            player_name: build.player_name,
            server_name: build.server_name,
            class_name: build.class_name,
            spec_name: build.spec_name,
            dungeon_id: build.dungeon_id,
            talents: build.talents,
            gear: build.gear,
            stats: build.stats,
            extracted_at: build.extracted_at,
        }
    }
}
