pub mod build;
pub mod report;
pub mod repository;

pub use build::Build;
pub use report::{FightRef, Report, RosterMember, PARTY_SIZE};
pub use repository::{BuildRepository, ReportRepository};
