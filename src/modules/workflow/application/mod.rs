pub mod analysis_step;
pub mod orchestrator;
pub mod runner;

pub use analysis_step::AnalysisStep;
pub use orchestrator::{ExecutionOutcome, ExecutionPlan, PhaseOrchestrator};
pub use runner::{ExecutionHandle, RunOutcome, RunnerConfig, WorkflowRunner};
