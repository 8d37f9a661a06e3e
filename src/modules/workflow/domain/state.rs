//! Persisted record of one execution of a workflow
use super::checkpoint::Checkpoint;
use super::phase::{Phase, WorkflowType};
use super::status::WorkflowStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub workflow_type: WorkflowType,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: WorkflowStatus,
    pub error_message: Option<String>,
    pub current_phase: Option<Phase>,
    /// Combination key that was being processed when the execution stopped
    pub last_processed_id: Option<String>,
    pub items_processed: i64,
    pub total_items: i64,
    pub progress_percentage: f64,
    pub parent_workflow_id: Option<Uuid>,
    pub continuation_count: i32,
    /// Identifies every execution of one continuation chain
    pub batch_id: Option<String>,
    pub class_name: Option<String>,
    pub api_requests_count: i64,
    pub performance_metrics: Option<serde_json::Value>,
    pub checkpoint: Checkpoint,
    /// Set when the run stopped on an error no retry can clear
    #[serde(default)]
    pub requires_intervention: bool,
}

impl WorkflowState {
    pub fn new(workflow_type: WorkflowType, class_name: Option<String>, total_items: i64) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            workflow_type,
            started_at: Utc::now(),
            completed_at: None,
            status: WorkflowStatus::Running,
            error_message: None,
            current_phase: None,
            last_processed_id: None,
            items_processed: 0,
            total_items: total_items.max(0),
            progress_percentage: 0.0,
            parent_workflow_id: None,
            continuation_count: 0,
            batch_id: Some(id.to_string()),
            class_name,
            api_requests_count: 0,
            performance_metrics: None,
            checkpoint: Checkpoint::default(),
            requires_intervention: false,
        }
    }

    /// Fresh execution that carries this one's checkpoint and counters forward
    pub fn continuation(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            status: WorkflowStatus::Running,
            error_message: None,
            parent_workflow_id: Some(self.id),
            continuation_count: self.continuation_count + 1,
            requires_intervention: false,
            ..self.clone()
        }
    }

    /// Adds processed items; the counter never decreases
    pub fn add_items(&mut self, count: u64) {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.items_processed = self.items_processed.saturating_add(count);
        self.refresh_progress();
    }

    /// Raises the expected total; a resumed run may never shrink it
    pub fn set_total_items(&mut self, total: i64) {
        self.total_items = self.total_items.max(total);
        self.refresh_progress();
    }

    pub fn progress(&self) -> f64 {
        if self.total_items > 0 {
            self.items_processed as f64 / self.total_items as f64 * 100.0
        } else {
            0.0
        }
    }

    fn refresh_progress(&mut self) {
        self.progress_percentage = self.progress();
    }

    pub fn add_api_requests(&mut self, count: u64) {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.api_requests_count = self.api_requests_count.saturating_add(count);
    }

    pub fn mark_completed(&mut self) {
        self.status = WorkflowStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.checkpoint.clear();
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = WorkflowStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
    }

    /// Failed on bad credentials or configuration; the next trigger starts over
    pub fn mark_halted(&mut self, message: impl Into<String>) {
        self.mark_failed(message);
        self.requires_intervention = true;
    }

    pub fn mark_rate_limited(&mut self, last_processed_id: Option<String>, message: impl Into<String>) {
        self.status = WorkflowStatus::RateLimited;
        self.completed_at = Some(Utc::now());
        self.last_processed_id = last_processed_id;
        self.error_message = Some(message.into());
    }

    pub fn is_resumable(&self) -> bool {
        self.status != WorkflowStatus::Completed && !self.requires_intervention
    }
}

/// Operator-facing view of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatistics {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub progress_percentage: f64,
    pub items_processed: i64,
    pub total_items: i64,
    pub continuation_count: i32,
    pub estimated_completion: Option<DateTime<Utc>>,
}
