pub mod extraction;
pub mod jobs;
pub mod metrics;
pub mod provider;
pub mod rankings;
pub mod scheduler;
pub mod workflow;
