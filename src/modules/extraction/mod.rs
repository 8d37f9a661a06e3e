//! Report and build extraction for the fights behind stored rankings
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{BuildsStep, ReportsStep};
pub use domain::{Build, BuildRepository, FightRef, Report, ReportRepository};
pub use infrastructure::ExtractionRepositoryImpl;
