use crate::modules::rankings::domain::{SyncMetrics, SyncMetricsSnapshot};
use crate::modules::workflow::domain::{Phase, WorkflowStatus};
use crate::shared::domain::EntityCounts;
use crate::shared::errors::AppResult;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Accumulated timing of one named operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationTiming {
    pub count: u64,
    pub total_ms: u64,
    pub fastest_ms: u64,
    pub slowest_ms: u64,
}

impl OperationTiming {
    fn record(&mut self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        if self.count == 0 || ms < self.fastest_ms {
            self.fastest_ms = ms;
        }
        self.slowest_ms = self.slowest_ms.max(ms);
        self.count += 1;
        self.total_ms += ms;
    }

    pub fn average_ms(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ms / self.count
        }
    }
}

/// Serializable view stored in `WorkflowState.performance_metrics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub workflow_type: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<u64>,
    pub status: Option<WorkflowStatus>,
    pub items_processed: u64,
    pub errors: u64,
    pub api_requests: u64,
    pub continuations: u64,
    #[serde(default)]
    pub operations: BTreeMap<String, OperationTiming>,
    /// Entity counts per phase
    #[serde(default)]
    pub phases: BTreeMap<Phase, EntityCounts>,
    /// Rankings, reports and builds counters plus recorded errors
    #[serde(default)]
    pub sync: SyncMetricsSnapshot,
    /// Aggregated rows written per analysis phase
    #[serde(default)]
    pub analysis_rows: BTreeMap<Phase, u64>,
}

#[derive(Debug, Default)]
struct CollectorState {
    snapshot: MetricsSnapshot,
    running: HashMap<String, Instant>,
}

/// Per-run metrics; counters behind one lock, sync counters shared with the
/// rankings service
pub struct MetricsCollector {
    state: Mutex<CollectorState>,
    sync: Arc<SyncMetrics>,
}

impl MetricsCollector {
    pub fn new(workflow_type: &str) -> Self {
        Self::from_snapshot(MetricsSnapshot {
            workflow_type: workflow_type.to_string(),
            start_time: Some(Utc::now()),
            ..Default::default()
        })
    }

    /// Continue counting where a previous execution stopped
    pub fn from_snapshot(mut snapshot: MetricsSnapshot) -> Self {
        let sync = Arc::new(SyncMetrics::from_snapshot(std::mem::take(&mut snapshot.sync)));
        snapshot.end_time = None;
        snapshot.total_duration_ms = None;
        snapshot.status = None;
        Self {
            state: Mutex::new(CollectorState {
                snapshot,
                running: HashMap::new(),
            }),
            sync,
        }
    }

    /// Restore from the JSON blob of a workflow row, or start fresh
    pub fn resume(workflow_type: &str, blob: Option<&serde_json::Value>) -> Self {
        match blob.map(|value| serde_json::from_value::<MetricsSnapshot>(value.clone())) {
            Some(Ok(snapshot)) => Self::from_snapshot(snapshot),
            _ => Self::new(workflow_type),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut CollectorState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn sync_metrics(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.sync)
    }

    pub fn start_operation(&self, name: &str) {
        self.update(|s| {
            s.running.insert(name.to_string(), Instant::now());
        });
    }

    /// Stops the timer started for `name`; None if none was running
    pub fn end_operation(&self, name: &str) -> Option<Duration> {
        self.update(|s| {
            let started = s.running.remove(name)?;
            let elapsed = started.elapsed();
            s.snapshot
                .operations
                .entry(name.to_string())
                .or_default()
                .record(elapsed);
            Some(elapsed)
        })
    }

    pub fn add_items(&self, count: u64) {
        self.update(|s| s.snapshot.items_processed += count);
    }

    pub fn record_error(&self) {
        self.update(|s| s.snapshot.errors += 1);
    }

    pub fn add_api_requests(&self, count: u64) {
        self.update(|s| s.snapshot.api_requests += count);
    }

    pub fn record_continuation(&self) {
        self.update(|s| s.snapshot.continuations += 1);
    }

    /// Counts produced by one combination of a phase
    pub fn record_phase_counts(&self, phase: Phase, counts: EntityCounts) {
        self.update(|s| *s.snapshot.phases.entry(phase).or_default() += counts);
        match phase {
            Phase::Reports => self.sync.record_reports(counts),
            Phase::Builds => self.sync.record_builds(counts),
            _ => {}
        }
    }

    pub fn record_analysis_rows(&self, phase: Phase, rows: u64) {
        self.update(|s| *s.snapshot.analysis_rows.entry(phase).or_default() += rows);
    }

    /// Stamp the end of the execution
    pub fn finish(&self, status: WorkflowStatus) {
        let now = Utc::now();
        self.update(|s| {
            s.snapshot.end_time = Some(now);
            s.snapshot.status = Some(status);
            s.snapshot.total_duration_ms = s
                .snapshot
                .start_time
                .and_then(|start| (now - start).to_std().ok())
                .map(|d| d.as_millis() as u64);
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = self.update(|s| s.snapshot.clone());
        snapshot.sync = self.sync.snapshot();
        snapshot
    }

    pub fn to_json(&self) -> AppResult<serde_json::Value> {
        Ok(serde_json::to_value(self.snapshot())?)
    }

    /// Extrapolates elapsed time over the progress made so far
    pub fn estimate_completion(&self, progress_percentage: f64) -> Option<DateTime<Utc>> {
        let start = self.update(|s| s.snapshot.start_time)?;
        estimate_completion(start, Utc::now(), progress_percentage)
    }
}

/// Completion estimate for a run started at `start` that is `progress`
/// percent done at `now`
pub fn estimate_completion(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    progress: f64,
) -> Option<DateTime<Utc>> {
    if !progress.is_finite() || progress <= 0.0 {
        return None;
    }
    if progress >= 100.0 {
        return Some(now);
    }
    let elapsed_ms = (now - start).num_milliseconds().max(0) as f64;
    let remaining_ms = elapsed_ms * (100.0 - progress) / progress;
    Some(now + ChronoDuration::milliseconds(remaining_ms as i64))
}
