//! Pipeline configuration
//!
//! Loaded from a JSON file (`KEYSTONE_CONFIG`, default `config/pipeline.json`)
//! with environment overrides for the tunable batch/worker/schedule options.
use crate::log_info;
use crate::modules::scheduler::domain::{
    find_overlap, OverlapPolicy, ScheduleConfig, ScheduleRetryPolicy, ScheduleScope, ScheduleSlot,
};
use crate::modules::workflow::domain::Phase;
use crate::shared::domain::{Combination, Dungeon};
use crate::shared::errors::{AppError, AppResult};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/pipeline.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Rankings per fetched page
    pub size: u32,
    pub retry_delay_ms: u64,
    pub max_attempts: u32,
    pub max_pages: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 100,
            retry_delay_ms: 2_000,
            max_attempts: 3,
            max_pages: 5,
        }
    }
}

impl BatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub num_workers: usize,
    /// Pause between successive pages of one batch driver
    pub request_delay_ms: u64,
    pub queue_capacity: usize,
    pub requests_per_second: f64,
    pub burst: u32,
    /// Longest provider retry-after a worker will sleep through before
    /// treating the quota as exhausted
    pub max_rate_limit_wait_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            request_delay_ms: 250,
            queue_capacity: 32,
            requests_per_second: 5.0,
            burst: 10,
            max_rate_limit_wait_secs: 120,
        }
    }
}

impl WorkerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn max_rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.max_rate_limit_wait_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Batches driven at once; must not exceed the worker pool size
    pub batch_concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_concurrency: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingsConfig {
    pub update_interval_secs: u64,
}

impl Default for RankingsConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 6 * 3600,
        }
    }
}

impl RankingsConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub phase_timeout_secs: u64,
    /// Wait before a continuation when the provider gave no retry-after
    pub continuation_delay_secs: u64,
    pub retention_days: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            phase_timeout_secs: 6 * 3600,
            continuation_delay_secs: 300,
            retention_days: 30,
        }
    }
}

impl WorkflowConfig {
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }

    pub fn continuation_delay(&self) -> Duration {
        Duration::from_secs(self.continuation_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulesConfig {
    pub paused: bool,
    pub timezone: String,
    pub rankings_cron: String,
    pub analysis_cron: String,
    /// Minimum distance between two class slots
    pub slot_window_minutes: u64,
    pub retry: ScheduleRetryPolicy,
    pub execution_timeout_secs: u64,
}

impl Default for SchedulesConfig {
    fn default() -> Self {
        Self {
            paused: false,
            timezone: "UTC".to_string(),
            rankings_cron: "0 0 1 * * *".to_string(),
            analysis_cron: "0 0 12 * * Sun".to_string(),
            slot_window_minutes: 180,
            retry: ScheduleRetryPolicy::default(),
            execution_timeout_secs: 24 * 3600,
        }
    }
}

impl SchedulesConfig {
    pub fn slot_window(&self) -> Duration {
        Duration::from_secs(self.slot_window_minutes * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.warcraftlogs.com/api/v2/client".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassConfig {
    pub name: String,
    pub specs: Vec<String>,
    /// Weekly slot for this class's report and build extraction
    pub slot: ScheduleSlot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub rankings: RankingsConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub schedule: SchedulesConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub classes: Vec<ClassConfig>,
    pub dungeons: Vec<Dungeon>,
}

impl PipelineConfig {
    /// Load from the configured file, apply environment overrides and validate
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let path =
            std::env::var("KEYSTONE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        log_info!(
            "Loaded pipeline config from {}: {} classes, {} dungeons, {} workers",
            path,
            config.classes.len(),
            config.dungeons.len(),
            config.worker.num_workers
        );

        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::ConfigError(format!("Invalid pipeline config: {}", e)))
    }

    /// Override recognized options from `lookup` (the process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> AppResult<T> {
            value
                .trim()
                .parse()
                .map_err(|_| AppError::ConfigError(format!("Invalid value for {}: {}", key, value)))
        }

        if let Some(v) = lookup("BATCH_SIZE") {
            self.batch.size = parse("BATCH_SIZE", v)?;
        }
        if let Some(v) = lookup("BATCH_RETRY_DELAY_MS") {
            self.batch.retry_delay_ms = parse("BATCH_RETRY_DELAY_MS", v)?;
        }
        if let Some(v) = lookup("BATCH_MAX_ATTEMPTS") {
            self.batch.max_attempts = parse("BATCH_MAX_ATTEMPTS", v)?;
        }
        if let Some(v) = lookup("WORKER_NUM_WORKERS") {
            self.worker.num_workers = parse("WORKER_NUM_WORKERS", v)?;
        }
        if let Some(v) = lookup("WORKER_REQUEST_DELAY_MS") {
            self.worker.request_delay_ms = parse("WORKER_REQUEST_DELAY_MS", v)?;
        }
        if let Some(v) = lookup("RANKINGS_UPDATE_INTERVAL_SECS") {
            self.rankings.update_interval_secs = parse("RANKINGS_UPDATE_INTERVAL_SECS", v)?;
        }
        if let Some(v) = lookup("SCHEDULE_PAUSED") {
            self.schedule.paused = parse("SCHEDULE_PAUSED", v)?;
        }
        if let Some(v) = lookup("WCL_API_TOKEN") {
            self.api.token = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        let positive = [
            ("batch.size", self.batch.size as u64),
            ("batch.maxAttempts", self.batch.max_attempts as u64),
            ("batch.maxPages", self.batch.max_pages as u64),
            ("worker.numWorkers", self.worker.num_workers as u64),
            ("worker.queueCapacity", self.worker.queue_capacity as u64),
            ("sync.batchConcurrency", self.sync.batch_concurrency as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AppError::ConfigError(format!("{} must be at least 1", name)));
            }
        }

        if !self.worker.requests_per_second.is_finite() || self.worker.requests_per_second <= 0.0 {
            return Err(AppError::ConfigError(
                "worker.requestsPerSecond must be positive".to_string(),
            ));
        }

        // The batch drivers must not be able to flood the pool's queue
        if self.sync.batch_concurrency > self.worker.num_workers {
            return Err(AppError::ConfigError(format!(
                "sync.batchConcurrency ({}) must not exceed worker.numWorkers ({})",
                self.sync.batch_concurrency, self.worker.num_workers
            )));
        }

        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.name.to_lowercase()) {
                return Err(AppError::ConfigError(format!(
                    "Class {} is configured twice",
                    class.name
                )));
            }
            if class.specs.is_empty() {
                return Err(AppError::ConfigError(format!(
                    "Class {} has no specs",
                    class.name
                )));
            }
            class.slot.validate()?;
        }

        let slots: Vec<(String, ScheduleSlot)> = self
            .classes
            .iter()
            .map(|c| (c.name.clone(), c.slot))
            .collect();
        if let Some((a, b)) = find_overlap(&slots, self.schedule.slot_window()) {
            return Err(AppError::ConfigError(format!(
                "Schedule slots of {} and {} are closer than {} minutes",
                a, b, self.schedule.slot_window_minutes
            )));
        }

        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        self.schedule.timezone.parse::<Tz>().map_err(|e| {
            AppError::ConfigError(format!(
                "Unknown timezone {}: {}",
                self.schedule.timezone, e
            ))
        })
    }

    /// All combinations in enumeration order, optionally limited to one class
    pub fn combinations(&self, class_filter: Option<&str>) -> Vec<Combination> {
        self.classes
            .iter()
            .filter(|class| class_filter.map_or(true, |f| class.name.eq_ignore_ascii_case(f)))
            .flat_map(|class| {
                class.specs.iter().flat_map(move |spec| {
                    self.dungeons
                        .iter()
                        .map(move |dungeon| Combination::new(&class.name, spec, dungeon.id))
                })
            })
            .collect()
    }

    /// Schedule definitions for every scope
    pub fn schedule_definitions(&self) -> AppResult<Vec<(ScheduleScope, ScheduleConfig)>> {
        let timezone = self.timezone()?;
        let base = |cron: String| ScheduleConfig {
            cron,
            timezone,
            overlap: OverlapPolicy::Skip,
            retry: self.schedule.retry.clone(),
            timeout: Duration::from_secs(self.schedule.execution_timeout_secs),
            paused: self.schedule.paused,
        };

        let mut definitions = vec![(
            ScheduleScope::Rankings,
            base(self.schedule.rankings_cron.clone()),
        )];
        for class in &self.classes {
            definitions.push((
                ScheduleScope::Class(class.name.clone()),
                base(class.slot.to_cron()),
            ));
        }
        for phase in Phase::ANALYSIS {
            definitions.push((
                ScheduleScope::Analysis(phase),
                base(self.schedule.analysis_cron.clone()),
            ));
        }
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "worker": { "num_workers": 4, "request_delay_ms": 0, "queue_capacity": 8,
                    "requests_per_second": 10.0, "burst": 5, "max_rate_limit_wait_secs": 60 },
        "sync": { "batch_concurrency": 2 },
        "classes": [
            { "name": "Priest", "specs": ["Discipline", "Holy", "Shadow"], "slot": { "day": 3, "hour": 2 } },
            { "name": "Hunter", "specs": ["Beast Mastery"], "slot": { "day": 2, "hour": 7 } }
        ],
        "dungeons": [ { "id": 12660, "name": "Ara-Kara" }, { "id": 12669, "name": "City of Threads" } ]
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = PipelineConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.batch.max_attempts, 3);
        assert_eq!(config.worker.num_workers, 4);
        assert_eq!(config.classes.len(), 2);
        config.validate().unwrap();
    }

    #[test]
    fn test_combination_enumeration_order() {
        let config = PipelineConfig::from_json_str(SAMPLE).unwrap();
        let all = config.combinations(None);
        assert_eq!(all.len(), 8);
        assert_eq!(all[0].key(), "Priest_Discipline_12660");
        assert_eq!(all[1].key(), "Priest_Discipline_12669");
        assert_eq!(all[7].key(), "Hunter_Beast Mastery_12669");

        let hunters = config.combinations(Some("hunter"));
        assert_eq!(hunters.len(), 2);
    }

    #[test]
    fn test_batch_concurrency_cannot_exceed_pool() {
        let mut config = PipelineConfig::from_json_str(SAMPLE).unwrap();
        config.sync.batch_concurrency = 5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_overlapping_class_slots_rejected() {
        let mut config = PipelineConfig::from_json_str(SAMPLE).unwrap();
        config.classes[1].slot = ScheduleSlot::new(3, 3, 0).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PipelineConfig::from_json_str(SAMPLE).unwrap();
        config
            .apply_env_overrides(|key| match key {
                "BATCH_SIZE" => Some("50".to_string()),
                "SCHEDULE_PAUSED" => Some("true".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.batch.size, 50);
        assert!(config.schedule.paused);

        let bad = config.apply_env_overrides(|key| {
            (key == "BATCH_MAX_ATTEMPTS").then(|| "many".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_schedule_definitions() {
        let config = PipelineConfig::from_json_str(SAMPLE).unwrap();
        let definitions = config.schedule_definitions().unwrap();
        // rankings + 2 classes + 3 analysis phases
        assert_eq!(definitions.len(), 6);
        let priest = definitions
            .iter()
            .find(|(scope, _)| *scope == ScheduleScope::Class("Priest".into()))
            .unwrap();
        assert_eq!(priest.1.cron, "0 0 2 * * Wed");
    }
}
