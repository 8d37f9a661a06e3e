/// Job execution module
///
/// Every outbound data-source request runs as a `Job` on the `WorkerPool`:
/// - Domain: job entities and the per-job worker state machine
/// - Worker: the pool of rate-limited worker tasks
pub mod domain;
pub mod worker;

// Re-exports for easy access
pub use domain::{Job, JobResult, JobType};
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
