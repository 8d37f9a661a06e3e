//! Rankings: leaderboard pages fetched per combination and stored with
//! replace semantics
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{BatchProcessor, SyncService};
pub use domain::{BatchResult, Ranking, RankingBatch, RankingRepository, SyncMetrics};
pub use infrastructure::RankingRepositoryImpl;
