use super::phase::WorkflowType;
use super::state::WorkflowState;
use super::status::WorkflowStatus;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage for workflow state rows
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create(&self, state: &WorkflowState) -> AppResult<()>;

    async fn update(&self, state: &WorkflowState) -> AppResult<()>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WorkflowState>>;

    /// Newest row for the type and class, if that row has not completed
    async fn find_resumable(
        &self,
        workflow_type: WorkflowType,
        class_name: Option<&str>,
    ) -> AppResult<Option<WorkflowState>>;

    /// Rows matching the filter, newest first
    async fn list(&self, filter: &WorkflowFilter) -> AppResult<Vec<WorkflowState>>;

    /// Delete completed and failed rows that ended before the cutoff
    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> AppResult<usize>;
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    pub workflow_type: Option<WorkflowType>,
    pub class_name: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub limit: Option<i64>,
}

impl WorkflowFilter {
    pub fn matches(&self, state: &WorkflowState) -> bool {
        self.workflow_type.map_or(true, |t| t == state.workflow_type)
            && self
                .class_name
                .as_deref()
                .map_or(true, |c| state.class_name.as_deref() == Some(c))
            && self.status.map_or(true, |s| s == state.status)
    }
}
