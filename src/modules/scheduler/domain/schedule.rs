//! Recurring trigger definitions
use crate::modules::workflow::domain::Phase;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MINUTES_PER_WEEK: i64 = 7 * 24 * 60;

/// What happens when a trigger fires while the previous run is still going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Reject the new trigger while a run for the same scope is active
    #[default]
    Skip,
    AllowAll,
}

/// Retry policy for the triggering infrastructure itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleRetryPolicy {
    pub initial_interval_secs: u64,
    pub backoff_coefficient: f64,
    pub max_interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for ScheduleRetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval_secs: 60,
            backoff_coefficient: 2.0,
            max_interval_secs: 3600,
            max_attempts: 3,
        }
    }
}

impl ScheduleRetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_interval_secs as f64 * self.backoff_coefficient.powi(exponent);
        let capped = secs.min(self.max_interval_secs as f64).max(0.0);
        Duration::from_secs_f64(capped)
    }
}

/// Weekly day/hour/minute at which a class's extraction fires.
/// `day` follows cron numbering: 0 = Sunday .. 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub day: u32,
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl ScheduleSlot {
    pub fn new(day: u32, hour: u32, minute: u32) -> AppResult<Self> {
        let slot = Self { day, hour, minute };
        slot.validate()?;
        Ok(slot)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.day > 6 || self.hour > 23 || self.minute > 59 {
            return Err(AppError::ConfigError(format!(
                "Invalid schedule slot day={} hour={} minute={}",
                self.day, self.hour, self.minute
            )));
        }
        Ok(())
    }

    pub fn weekday(&self) -> Weekday {
        match self.day {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            _ => Weekday::Sat,
        }
    }

    /// Six-field cron expression (seconds first); the weekday is spelled out
    /// so the numbering convention of the cron parser does not matter
    pub fn to_cron(&self) -> String {
        format!("0 {} {} * * {}", self.minute, self.hour, self.weekday())
    }

    fn minute_of_week(&self) -> i64 {
        i64::from(self.weekday().num_days_from_monday()) * 24 * 60
            + i64::from(self.hour) * 60
            + i64::from(self.minute)
    }

    /// Two slots overlap when their windows intersect anywhere in the week
    pub fn overlaps(&self, other: &ScheduleSlot, window: Duration) -> bool {
        let window_minutes = (window.as_secs() / 60) as i64;
        let diff = (self.minute_of_week() - other.minute_of_week()).rem_euclid(MINUTES_PER_WEEK);
        let distance = diff.min(MINUTES_PER_WEEK - diff);
        distance < window_minutes
    }

    /// Next fire time strictly after `after`, in the same timezone
    pub fn next_after<T: TimeZone>(&self, after: &DateTime<T>) -> Option<DateTime<T>> {
        let tz = after.timezone();
        let local = after.naive_local();
        let target = i64::from(self.weekday().num_days_from_monday());
        let current = i64::from(local.weekday().num_days_from_monday());
        let days_ahead = (target - current).rem_euclid(7);

        let date = local.date() + ChronoDuration::days(days_ahead);
        let mut candidate = date.and_hms_opt(self.hour, self.minute, 0)?;
        if candidate <= local {
            candidate += ChronoDuration::days(7);
        }
        tz.from_local_datetime(&candidate).earliest()
    }
}

/// Returns the first pair of named slots whose windows overlap
pub fn find_overlap<'a>(
    slots: &'a [(String, ScheduleSlot)],
    window: Duration,
) -> Option<(&'a str, &'a str)> {
    for (i, (name_a, slot_a)) in slots.iter().enumerate() {
        for (name_b, slot_b) in slots.iter().skip(i + 1) {
            if slot_a.overlaps(slot_b, window) {
                return Some((name_a.as_str(), name_b.as_str()));
            }
        }
    }
    None
}

/// One schedulable unit of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScheduleScope {
    /// Global rankings for every class
    Rankings,
    /// Report and build extraction for one class
    Class(String),
    /// One statistics analysis phase
    Analysis(Phase),
}

impl ScheduleScope {
    pub fn name(&self) -> String {
        match self {
            ScheduleScope::Rankings => "rankings".to_string(),
            ScheduleScope::Class(class) => format!("class:{}", class.to_lowercase()),
            ScheduleScope::Analysis(phase) => format!("analysis:{}", phase),
        }
    }

    /// Phases a trigger of this scope runs, in order
    pub fn phases(&self) -> Vec<Phase> {
        match self {
            ScheduleScope::Rankings => vec![Phase::Rankings],
            ScheduleScope::Class(_) => vec![Phase::Reports, Phase::Builds],
            ScheduleScope::Analysis(phase) => vec![*phase],
        }
    }

    pub fn class_filter(&self) -> Option<&str> {
        match self {
            ScheduleScope::Class(class) => Some(class.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScheduleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Static trigger definition for one scope
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub cron: String,
    pub timezone: Tz,
    pub overlap: OverlapPolicy,
    pub retry: ScheduleRetryPolicy,
    /// Upper bound on a single execution
    pub timeout: Duration,
    pub paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_slot_cron_expression() {
        let slot = ScheduleSlot::new(3, 2, 0).unwrap();
        assert_eq!(slot.to_cron(), "0 0 2 * * Wed");

        let slot = ScheduleSlot::new(0, 23, 45).unwrap();
        assert_eq!(slot.to_cron(), "0 45 23 * * Sun");
    }

    #[test]
    fn test_slot_validation() {
        assert!(ScheduleSlot::new(7, 0, 0).is_err());
        assert!(ScheduleSlot::new(1, 24, 0).is_err());
        assert!(ScheduleSlot::new(1, 0, 60).is_err());
    }

    #[test]
    fn test_overlap_wraps_around_the_week() {
        let saturday_late = ScheduleSlot::new(6, 23, 30).unwrap();
        let sunday_early = ScheduleSlot::new(0, 0, 30).unwrap();
        // Sunday follows Saturday; Monday-based minute offsets must still see one hour apart
        assert!(saturday_late.overlaps(&sunday_early, Duration::from_secs(2 * 3600)));
        assert!(!saturday_late.overlaps(&sunday_early, Duration::from_secs(3600)));
    }

    #[test]
    fn test_find_overlap() {
        let slots = vec![
            ("Priest".to_string(), ScheduleSlot::new(3, 2, 0).unwrap()),
            ("Hunter".to_string(), ScheduleSlot::new(2, 7, 0).unwrap()),
            ("Mage".to_string(), ScheduleSlot::new(3, 4, 0).unwrap()),
        ];
        let window = Duration::from_secs(4 * 3600);
        assert_eq!(find_overlap(&slots, window), Some(("Priest", "Mage")));
        assert_eq!(find_overlap(&slots[..2], window), None);
    }

    #[test]
    fn test_next_after() {
        // 2025-01-06 is a Monday
        let monday = Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap();
        let slot = ScheduleSlot::new(3, 2, 0).unwrap();
        let next = slot.next_after(&monday).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 8, 2, 0, 0).unwrap());

        // Exactly at the fire time: the next one is a week later
        let next_again = slot.next_after(&next).unwrap();
        assert_eq!(next_again, Utc.with_ymd_and_hms(2025, 1, 15, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = ScheduleRetryPolicy {
            initial_interval_secs: 10,
            backoff_coefficient: 2.0,
            max_interval_secs: 30,
            max_attempts: 5,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(30));
        assert_eq!(policy.delay_for(4), Duration::from_secs(30));
    }

    #[test]
    fn test_scope_names_and_phases() {
        assert_eq!(ScheduleScope::Rankings.name(), "rankings");
        assert_eq!(ScheduleScope::Class("Priest".into()).name(), "class:priest");
        assert_eq!(
            ScheduleScope::Analysis(Phase::TalentAnalysis).name(),
            "analysis:talent_analysis"
        );
        assert_eq!(
            ScheduleScope::Class("Priest".into()).phases(),
            vec![Phase::Reports, Phase::Builds]
        );
    }
}
