/// Runs the per-phase aggregation functions installed by the migrations
use crate::modules::workflow::domain::{Phase, StatisticsAggregator};
use crate::shared::domain::Combination;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::Database;
use crate::shared::utils::logger::LogContext;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use std::time::Instant;

#[derive(QueryableByName)]
struct AggregatedRows {
    #[diesel(sql_type = BigInt)]
    row_count: i64,
}

pub struct SqlStatisticsAggregator {
    db: Database,
}

impl SqlStatisticsAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn function_for(phase: Phase) -> AppResult<&'static str> {
        match phase {
            Phase::EquipmentAnalysis => Ok("aggregate_equipment_statistics"),
            Phase::TalentAnalysis => Ok("aggregate_talent_statistics"),
            Phase::StatAnalysis => Ok("aggregate_stat_statistics"),
            other => Err(AppError::ConfigError(format!(
                "{} has no aggregation function",
                other
            ))),
        }
    }
}

#[async_trait]
impl StatisticsAggregator for SqlStatisticsAggregator {
    async fn aggregate(&self, phase: Phase, combination: &Combination) -> AppResult<u64> {
        let function = Self::function_for(phase)?;
        let combination = combination.clone();
        let start = Instant::now();

        let result = self
            .db
            .run(move |conn| {
                diesel::sql_query(format!("SELECT {}($1, $2, $3) AS row_count", function))
                    .bind::<Text, _>(&combination.class_name)
                    .bind::<Text, _>(&combination.spec_name)
                    .bind::<Integer, _>(combination.dungeon_id)
                    .get_result::<AggregatedRows>(conn)
                    .map_err(AppError::from)
            })
            .await?;

        LogContext::db_operation(function, "statistics", Some(start.elapsed().as_millis() as u64));
        Ok(result.row_count.max(0) as u64)
    }
}
