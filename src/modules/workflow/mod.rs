/// Durable, resumable multi-phase workflows
///
/// - Domain: phases, workflow state, checkpoint and the step/storage ports
/// - Application: the phase orchestrator and the runner that chains
///   continuations
/// - Infrastructure: Diesel-based state storage and SQL aggregation
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{AnalysisStep, ExecutionHandle, PhaseOrchestrator, RunOutcome, WorkflowRunner};
pub use domain::{Checkpoint, Phase, WorkflowRepository, WorkflowState, WorkflowStatus, WorkflowType};
pub use infrastructure::{SqlStatisticsAggregator, WorkflowRepositoryImpl};
