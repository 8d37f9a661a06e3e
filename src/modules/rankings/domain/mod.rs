pub mod batch;
pub mod ranking;
pub mod repository;
pub mod sync_metrics;

pub use batch::{BatchResult, RankingBatch};
pub use ranking::Ranking;
pub use repository::{diff_rankings, RankingRepository};
pub use sync_metrics::{SyncMetrics, SyncMetricsSnapshot};
