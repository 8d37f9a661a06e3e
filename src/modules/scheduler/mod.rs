/// Recurring triggers for the pipeline
///
/// One schedule entry per scope: global rankings, one per class for report and
/// build extraction (staggered to distinct weekly slots so no two classes spend
/// quota at the same time), and one per analysis phase.
pub mod application;
pub mod domain;

pub use application::{ScopeRunner, SchedulerService};
pub use domain::{OverlapPolicy, ScheduleConfig, ScheduleRetryPolicy, ScheduleScope, ScheduleSlot};
