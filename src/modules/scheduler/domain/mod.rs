pub mod schedule;

pub use schedule::{
    find_overlap, OverlapPolicy, ScheduleConfig, ScheduleRetryPolicy, ScheduleScope, ScheduleSlot,
};
