pub mod service;

pub use service::{fire, ScheduleInfo, ScopeRunner, SchedulerService};
