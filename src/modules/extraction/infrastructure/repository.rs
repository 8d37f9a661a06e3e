/// Diesel-based report and build storage
use super::models::{NewBuild, NewReport};
use crate::modules::extraction::domain::{
    Build, BuildRepository, FightRef, Report, ReportRepository,
};
use crate::schema::{player_builds, player_rankings, reports};
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::Database;
use crate::shared::utils::logger::LogContext;
use async_trait::async_trait;
use diesel::dsl::{exists, not};
use diesel::prelude::*;
use std::time::Instant;

type FightRow = (String, i32, String, String);

fn to_fight_ref((report_code, fight_id, player_name, server_name): FightRow) -> FightRef {
    FightRef {
        report_code,
        fight_id,
        player_name,
        server_name,
    }
}

pub struct ExtractionRepositoryImpl {
    db: Database,
}

impl ExtractionRepositoryImpl {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportRepository for ExtractionRepositoryImpl {
    async fn missing_reports(&self, combination: &Combination) -> AppResult<Vec<FightRef>> {
        let combination = combination.clone();
        let rows = self
            .db
            .run(move |conn| {
                player_rankings::table
                    .filter(player_rankings::class_name.eq(&combination.class_name))
                    .filter(player_rankings::spec_name.eq(&combination.spec_name))
                    .filter(player_rankings::dungeon_id.eq(combination.dungeon_id))
                    .filter(not(exists(
                        reports::table
                            .filter(reports::report_code.eq(player_rankings::report_code))
                            .filter(reports::fight_id.eq(player_rankings::fight_id)),
                    )))
                    .order(player_rankings::score.desc())
                    .select((
                        player_rankings::report_code,
                        player_rankings::fight_id,
                        player_rankings::player_name,
                        player_rankings::server_name,
                    ))
                    .load::<FightRow>(conn)
                    .map_err(AppError::from)
            })
            .await?;
        Ok(rows.into_iter().map(to_fight_ref).collect())
    }

    async fn store_reports(&self, new_reports: Vec<Report>) -> AppResult<EntityCounts> {
        let total = new_reports.len() as u64;
        let rows = new_reports
            .into_iter()
            .map(NewReport::from_domain)
            .collect::<AppResult<Vec<_>>>()?;
        let start = Instant::now();

        let inserted = self
            .db
            .run(move |conn| {
                diesel::insert_into(reports::table)
                    .values(&rows)
                    .on_conflict((reports::report_code, reports::fight_id))
                    .do_nothing()
                    .execute(conn)
                    .map_err(AppError::from)
            })
            .await? as u64;

        LogContext::db_operation("insert", "reports", Some(start.elapsed().as_millis() as u64));
        Ok(EntityCounts {
            new: inserted,
            unchanged: total.saturating_sub(inserted),
            ..Default::default()
        })
    }
}

#[async_trait]
impl BuildRepository for ExtractionRepositoryImpl {
    async fn fights_without_builds(&self, combination: &Combination) -> AppResult<Vec<FightRef>> {
        let combination = combination.clone();
        let rows = self
            .db
            .run(move |conn| {
                player_rankings::table
                    .filter(player_rankings::class_name.eq(&combination.class_name))
                    .filter(player_rankings::spec_name.eq(&combination.spec_name))
                    .filter(player_rankings::dungeon_id.eq(combination.dungeon_id))
                    .filter(exists(
                        reports::table
                            .filter(reports::report_code.eq(player_rankings::report_code))
                            .filter(reports::fight_id.eq(player_rankings::fight_id)),
                    ))
                    .filter(not(exists(
                        player_builds::table
                            .filter(player_builds::report_code.eq(player_rankings::report_code))
                            .filter(player_builds::fight_id.eq(player_rankings::fight_id))
                            .filter(player_builds::player_name.eq(player_rankings::player_name))
                            .filter(player_builds::server_name.eq(player_rankings::server_name)),
                    )))
                    .order(player_rankings::score.desc())
                    .select((
                        player_rankings::report_code,
                        player_rankings::fight_id,
                        player_rankings::player_name,
                        player_rankings::server_name,
                    ))
                    .load::<FightRow>(conn)
                    .map_err(AppError::from)
            })
            .await?;
        Ok(rows.into_iter().map(to_fight_ref).collect())
    }

    async fn store_builds(&self, builds: Vec<Build>) -> AppResult<EntityCounts> {
        let rows: Vec<NewBuild> = builds.into_iter().map(NewBuild::from).collect();
        let start = Instant::now();

        let counts = self
            .db
            .run(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let mut counts = EntityCounts::default();
                    for row in &rows {
                        let existing: i64 = player_builds::table
                            .filter(player_builds::report_code.eq(&row.report_code))
                            .filter(player_builds::fight_id.eq(row.fight_id))
                            .filter(player_builds::player_name.eq(&row.player_name))
                            .filter(player_builds::server_name.eq(&row.server_name))
                            .count()
                            .get_result(conn)?;

                        diesel::insert_into(player_builds::table)
                            .values(row)
                            .on_conflict((
                                player_builds::report_code,
                                player_builds::fight_id,
                                player_builds::player_name,
                                player_builds::server_name,
                            ))
                            .do_update()
                            .set(row)
                            .execute(conn)?;

                        if existing > 0 {
                            counts.updated += 1;
                        } else {
                            counts.new += 1;
                        }
                    }
                    Ok(counts)
                })
                .map_err(AppError::from)
            })
            .await?;

        LogContext::db_operation(
            "upsert",
            "player_builds",
            Some(start.elapsed().as_millis() as u64),
        );
        Ok(counts)
    }
}
