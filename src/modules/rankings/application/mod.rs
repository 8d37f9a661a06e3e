pub mod batch_processor;
pub mod sync_service;

pub use batch_processor::{BatchProcessor, BatchProcessorConfig, JobRun};
pub use sync_service::{CombinationReport, CombinationSync, SyncService, SyncServiceConfig};
