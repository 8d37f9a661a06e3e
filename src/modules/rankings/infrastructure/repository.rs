/// Diesel-based implementation of RankingRepository
///
/// Storing a combination replaces its rows inside one transaction.
use super::models::{NewRanking, RankingModel};
use crate::modules::rankings::domain::{diff_rankings, Ranking, RankingRepository};
use crate::schema::player_rankings;
use crate::shared::domain::{Combination, EntityCounts};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::Database;
use crate::shared::utils::logger::LogContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use std::time::Instant;

pub struct RankingRepositoryImpl {
    db: Database,
}

impl RankingRepositoryImpl {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn load_rankings(conn: &mut PgConnection, combination: &Combination) -> QueryResult<Vec<Ranking>> {
    let rows: Vec<RankingModel> = player_rankings::table
        .filter(player_rankings::class_name.eq(&combination.class_name))
        .filter(player_rankings::spec_name.eq(&combination.spec_name))
        .filter(player_rankings::dungeon_id.eq(combination.dungeon_id))
        .order(player_rankings::score.desc())
        .select(RankingModel::as_select())
        .load(conn)?;
    Ok(rows.into_iter().map(Ranking::from).collect())
}

#[async_trait]
impl RankingRepository for RankingRepositoryImpl {
    async fn get_last_update(&self, combination: &Combination) -> AppResult<Option<DateTime<Utc>>> {
        let combination = combination.clone();
        self.db
            .run(move |conn| {
                player_rankings::table
                    .filter(player_rankings::class_name.eq(&combination.class_name))
                    .filter(player_rankings::spec_name.eq(&combination.spec_name))
                    .filter(player_rankings::dungeon_id.eq(combination.dungeon_id))
                    .select(max(player_rankings::fetched_at))
                    .first::<Option<DateTime<Utc>>>(conn)
                    .map_err(AppError::from)
            })
            .await
    }

    async fn store_rankings(
        &self,
        combination: &Combination,
        rankings: Vec<Ranking>,
    ) -> AppResult<EntityCounts> {
        let combination = combination.clone();
        let start = Instant::now();

        let counts = self
            .db
            .run(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    let existing = load_rankings(conn, &combination)?;
                    let counts = diff_rankings(&existing, &rankings);

                    diesel::delete(
                        player_rankings::table
                            .filter(player_rankings::class_name.eq(&combination.class_name))
                            .filter(player_rankings::spec_name.eq(&combination.spec_name))
                            .filter(player_rankings::dungeon_id.eq(combination.dungeon_id)),
                    )
                    .execute(conn)?;

                    let rows: Vec<NewRanking> = rankings.into_iter().map(NewRanking::from).collect();
                    diesel::insert_into(player_rankings::table)
                        .values(&rows)
                        .execute(conn)?;

                    Ok(counts)
                })
                .map_err(AppError::from)
            })
            .await?;

        LogContext::db_operation(
            "replace",
            "player_rankings",
            Some(start.elapsed().as_millis() as u64),
        );
        Ok(counts)
    }

    async fn list_rankings(&self, combination: &Combination) -> AppResult<Vec<Ranking>> {
        let combination = combination.clone();
        self.db
            .run(move |conn| load_rankings(conn, &combination).map_err(AppError::from))
            .await
    }
}
