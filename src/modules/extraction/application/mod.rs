pub mod builds_step;
pub mod reports_step;

pub use builds_step::BuildsStep;
pub use reports_step::ReportsStep;
