/// Per-run observability: operation timers, counters and the JSON snapshot
/// persisted with every workflow state update
pub mod collector;

pub use collector::{estimate_completion, MetricsCollector, MetricsSnapshot, OperationTiming};
