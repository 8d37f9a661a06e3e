pub mod aggregator;
pub mod models;
pub mod repository;

pub use aggregator::SqlStatisticsAggregator;
pub use repository::WorkflowRepositoryImpl;
