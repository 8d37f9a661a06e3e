pub mod analysis;
pub mod checkpoint;
pub mod phase;
pub mod repository;
pub mod state;
pub mod status;
pub mod step;

pub use analysis::StatisticsAggregator;
pub use checkpoint::Checkpoint;
pub use phase::{Phase, WorkflowType};
pub use repository::{WorkflowFilter, WorkflowRepository};
pub use state::{WorkflowState, WorkflowStatistics};
pub use status::WorkflowStatus;
pub use step::{PhaseStep, StepError, StepOutcome, StepResult};
