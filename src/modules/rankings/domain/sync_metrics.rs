//! Run-wide sync counters, updated concurrently by batch completions
use crate::shared::domain::EntityCounts;
use crate::shared::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

const MAX_RECORDED_ERRORS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetricsSnapshot {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub batches_total: u64,
    pub batches_processed: u64,
    pub rankings: EntityCounts,
    pub reports: EntityCounts,
    pub builds: EntityCounts,
    /// New rankings per combination key
    #[serde(default)]
    pub new_rankings: BTreeMap<String, u64>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub error_count: u64,
}

/// All mutation goes through one lock so concurrent completions never lose
/// an increment
#[derive(Debug, Default)]
pub struct SyncMetrics {
    inner: Mutex<SyncMetricsSnapshot>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::from_snapshot(SyncMetricsSnapshot {
            start_time: Some(Utc::now()),
            ..Default::default()
        })
    }

    /// Continue counting from a persisted snapshot
    pub fn from_snapshot(snapshot: SyncMetricsSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    fn update(&self, f: impl FnOnce(&mut SyncMetricsSnapshot)) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inner);
    }

    pub fn add_batches(&self, count: u64) {
        self.update(|m| m.batches_total += count);
    }

    /// Total for a run that may span several executions
    pub fn set_batches_total(&self, total: u64) {
        self.update(|m| m.batches_total = total);
    }

    pub fn record_rankings(&self, key: &str, counts: EntityCounts) {
        self.update(|m| {
            m.batches_processed += 1;
            m.rankings += counts;
            if counts.new > 0 {
                *m.new_rankings.entry(key.to_string()).or_default() += counts.new;
            }
        });
    }

    /// Batch left alone because its data is still fresh
    pub fn record_fresh_skip(&self) {
        self.update(|m| {
            m.batches_processed += 1;
            m.rankings.skipped += 1;
        });
    }

    pub fn record_reports(&self, counts: EntityCounts) {
        self.update(|m| m.reports += counts);
    }

    pub fn record_builds(&self, counts: EntityCounts) {
        self.update(|m| m.builds += counts);
    }

    pub fn record_error(&self, key: &str, error: &AppError) {
        self.update(|m| {
            m.error_count += 1;
            if m.errors.len() < MAX_RECORDED_ERRORS {
                m.errors.push(format!("{}: {}", key, error));
            }
        });
    }

    pub fn finish(&self) {
        self.update(|m| m.end_time = Some(Utc::now()));
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
