/// Diesel-based implementation of WorkflowRepository
use super::models::WorkflowStateModel;
use crate::modules::workflow::domain::{
    WorkflowFilter, WorkflowRepository, WorkflowState, WorkflowStatus, WorkflowType,
};
use crate::schema::workflow_states;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

pub struct WorkflowRepositoryImpl {
    db: Database,
}

impl WorkflowRepositoryImpl {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkflowRepository for WorkflowRepositoryImpl {
    async fn create(&self, state: &WorkflowState) -> AppResult<()> {
        let row = WorkflowStateModel::from_domain(state)?;
        self.db
            .run(move |conn| {
                diesel::insert_into(workflow_states::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, state: &WorkflowState) -> AppResult<()> {
        let row = WorkflowStateModel::from_domain(state)?;
        self.db
            .run(move |conn| {
                let updated = diesel::update(workflow_states::table.find(row.id))
                    .set(&row)
                    .execute(conn)?;
                if updated == 0 {
                    return Err(AppError::NotFound(format!("Workflow {}", row.id)));
                }
                Ok(())
            })
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WorkflowState>> {
        let row = self
            .db
            .run(move |conn| {
                workflow_states::table
                    .find(id)
                    .select(WorkflowStateModel::as_select())
                    .first(conn)
                    .optional()
                    .map_err(AppError::from)
            })
            .await?;
        row.map(WorkflowStateModel::into_domain).transpose()
    }

    async fn find_resumable(
        &self,
        workflow_type: WorkflowType,
        class_name: Option<&str>,
    ) -> AppResult<Option<WorkflowState>> {
        let workflow_type = workflow_type.as_string();
        let class_name = class_name.map(str::to_string);
        let row = self
            .db
            .run(move |conn| {
                let mut query = workflow_states::table
                    .filter(workflow_states::workflow_type.eq(workflow_type))
                    .into_boxed();
                query = match class_name {
                    Some(class) => query.filter(workflow_states::class_name.eq(class)),
                    None => query.filter(workflow_states::class_name.is_null()),
                };
                query
                    .order(workflow_states::started_at.desc())
                    .select(WorkflowStateModel::as_select())
                    .first(conn)
                    .optional()
                    .map_err(AppError::from)
            })
            .await?;

        let state = row.map(WorkflowStateModel::into_domain).transpose()?;
        Ok(state.filter(WorkflowState::is_resumable))
    }

    async fn list(&self, filter: &WorkflowFilter) -> AppResult<Vec<WorkflowState>> {
        let filter = filter.clone();
        let rows = self
            .db
            .run(move |conn| {
                let mut query = workflow_states::table.into_boxed();
                if let Some(workflow_type) = filter.workflow_type {
                    query = query.filter(workflow_states::workflow_type.eq(workflow_type.as_string()));
                }
                if let Some(class) = filter.class_name {
                    query = query.filter(workflow_states::class_name.eq(class));
                }
                if let Some(status) = filter.status {
                    query = query.filter(workflow_states::status.eq(status));
                }
                if let Some(limit) = filter.limit {
                    query = query.limit(limit);
                }
                query
                    .order(workflow_states::started_at.desc())
                    .select(WorkflowStateModel::as_select())
                    .load(conn)
                    .map_err(AppError::from)
            })
            .await?;
        rows.into_iter().map(WorkflowStateModel::into_domain).collect()
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        self.db
            .run(move |conn| {
                diesel::delete(
                    workflow_states::table
                        .filter(
                            workflow_states::status
                                .eq_any(vec![WorkflowStatus::Completed, WorkflowStatus::Failed]),
                        )
                        .filter(workflow_states::completed_at.lt(cutoff)),
                )
                .execute(conn)
                .map_err(AppError::from)
            })
            .await
    }
}
