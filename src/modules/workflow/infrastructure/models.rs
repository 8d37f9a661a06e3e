use crate::modules::workflow::domain::{
    Checkpoint, Phase, WorkflowState, WorkflowStatus, WorkflowType,
};
use crate::schema::workflow_states;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = workflow_states)]
#[diesel(treat_none_as_null = true)]
pub struct WorkflowStateModel {
    pub id: Uuid,
    pub workflow_type: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: WorkflowStatus,
    pub error_message: Option<String>,
    pub current_phase: Option<String>,
    pub last_processed_id: Option<String>,
    pub items_processed: i64,
    pub total_items: i64,
    pub progress_percentage: f64,
    pub parent_workflow_id: Option<Uuid>,
    pub continuation_count: i32,
    pub batch_id: Option<String>,
    pub class_name: Option<String>,
    pub api_requests_count: i64,
    pub performance_metrics: Option<Value>,
    pub checkpoint: Value,
    pub requires_intervention: bool,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStateModel {
    pub fn from_domain(state: &WorkflowState) -> AppResult<Self> {
        Ok(Self {
            id: state.id,
            workflow_type: state.workflow_type.as_string(),
            started_at: state.started_at,
            completed_at: state.completed_at,
            status: state.status,
            error_message: state.error_message.clone(),
            current_phase: state.current_phase.map(|p| p.as_str().to_string()),
            last_processed_id: state.last_processed_id.clone(),
            items_processed: state.items_processed,
            total_items: state.total_items,
            progress_percentage: state.progress_percentage,
            parent_workflow_id: state.parent_workflow_id,
            continuation_count: state.continuation_count,
            batch_id: state.batch_id.clone(),
            class_name: state.class_name.clone(),
            api_requests_count: state.api_requests_count,
            performance_metrics: state.performance_metrics.clone(),
            checkpoint: serde_json::to_value(&state.checkpoint)?,
            requires_intervention: state.requires_intervention,
            updated_at: Utc::now(),
        })
    }

    pub fn into_domain(self) -> AppResult<WorkflowState> {
        let workflow_type: WorkflowType = self
            .workflow_type
            .parse()
            .map_err(|e: String| AppError::DatabaseError(e))?;
        let current_phase = self
            .current_phase
            .map(|p| p.parse::<Phase>())
            .transpose()
            .map_err(AppError::DatabaseError)?;
        let checkpoint: Checkpoint = serde_json::from_value(self.checkpoint)?;

        Ok(WorkflowState {
            id: self.id,
            workflow_type,
            started_at: self.started_at,
            completed_at: self.completed_at,
            status: self.status,
            error_message: self.error_message,
            current_phase,
            last_processed_id: self.last_processed_id,
            items_processed: self.items_processed,
            total_items: self.total_items,
            progress_percentage: self.progress_percentage,
            parent_workflow_id: self.parent_workflow_id,
            continuation_count: self.continuation_count,
            batch_id: self.batch_id,
            class_name: self.class_name,
            api_requests_count: self.api_requests_count,
            performance_metrics: self.performance_metrics,
            checkpoint,
            requires_intervention: self.requires_intervention,
        })
    }
}
