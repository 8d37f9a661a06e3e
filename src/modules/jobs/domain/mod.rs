pub mod entities;
pub mod worker_state;

pub use entities::{Job, JobResult, JobType};
pub use worker_state::{backoff_duration, CallOutcome, WorkerState};
