/// In-memory stand-ins for the provider and the storage ports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keystone_sync::modules::extraction::domain::{
    Build, BuildRepository, FightRef, Report, ReportRepository,
};
use keystone_sync::modules::provider::domain::queries;
use keystone_sync::modules::provider::DataSourceClient;
use keystone_sync::modules::rankings::domain::{diff_rankings, Ranking, RankingRepository};
use keystone_sync::modules::workflow::domain::{
    Phase, PhaseStep, StepError, StepOutcome, StepResult, WorkflowFilter, WorkflowRepository,
    WorkflowState, WorkflowStatus, WorkflowType,
};
use keystone_sync::shared::domain::{Combination, EntityCounts};
use keystone_sync::shared::errors::{AppError, AppResult};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Which query a client call carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Rankings,
    ReportFights,
    PlayerDetails,
    Other,
}

impl QueryKind {
    pub fn of(query: &str) -> Self {
        if query == queries::CHARACTER_RANKINGS_QUERY {
            QueryKind::Rankings
        } else if query == queries::REPORT_FIGHTS_QUERY {
            QueryKind::ReportFights
        } else if query == queries::PLAYER_DETAILS_QUERY {
            QueryKind::PlayerDetails
        } else {
            QueryKind::Other
        }
    }
}

type Responder = Box<dyn Fn(QueryKind, &Value, u32) -> AppResult<Value> + Send + Sync>;

/// Data source answering from a closure; the closure gets the query kind,
/// the variables and the zero-based index of the call
pub struct ScriptedClient {
    responder: Responder,
    latency: Duration,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(QueryKind, &Value, u32) -> AppResult<Value> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every call takes `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSourceClient for ScriptedClient {
    async fn execute(&self, query: &str, variables: &Value) -> AppResult<Value> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = (self.responder)(QueryKind::of(query), variables, index);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Default)]
pub struct InMemoryRankingRepository {
    rankings: Mutex<HashMap<String, Vec<Ranking>>>,
    updated: Mutex<HashMap<String, DateTime<Utc>>>,
    store_calls: AtomicU32,
}

impl InMemoryRankingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the combination was stored at `at`
    pub fn set_last_update(&self, combination: &Combination, at: DateTime<Utc>) {
        self.updated.lock().unwrap().insert(combination.key(), at);
    }

    pub fn stored(&self, combination: &Combination) -> Vec<Ranking> {
        self.rankings
            .lock()
            .unwrap()
            .get(&combination.key())
            .cloned()
            .unwrap_or_default()
    }

    pub fn stored_combinations(&self) -> usize {
        self.rankings.lock().unwrap().len()
    }

    pub fn store_calls(&self) -> u32 {
        self.store_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankingRepository for InMemoryRankingRepository {
    async fn get_last_update(&self, combination: &Combination) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.updated.lock().unwrap().get(&combination.key()).copied())
    }

    async fn store_rankings(
        &self,
        combination: &Combination,
        rankings: Vec<Ranking>,
    ) -> AppResult<EntityCounts> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        let mut stored = self.rankings.lock().unwrap();
        let existing = stored.get(&combination.key()).cloned().unwrap_or_default();
        let counts = diff_rankings(&existing, &rankings);
        stored.insert(combination.key(), rankings);
        self.updated.lock().unwrap().insert(combination.key(), Utc::now());
        Ok(counts)
    }

    async fn list_rankings(&self, combination: &Combination) -> AppResult<Vec<Ranking>> {
        Ok(self.stored(combination))
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    states: Mutex<Vec<WorkflowState>>,
    updates: AtomicU32,
    progress: Mutex<Vec<i64>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<WorkflowState> {
        self.states.lock().unwrap().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<WorkflowState> {
        self.states.lock().unwrap().iter().find(|s| s.id == id).cloned()
    }

    pub fn insert(&self, state: WorkflowState) {
        self.states.lock().unwrap().push(state);
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }

    /// `items_processed` of every update, in write order
    pub fn progress_history(&self) -> Vec<i64> {
        self.progress.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn create(&self, state: &WorkflowState) -> AppResult<()> {
        let mut states = self.states.lock().unwrap();
        if states.iter().any(|s| s.id == state.id) {
            return Err(AppError::DatabaseError(format!("duplicate workflow {}", state.id)));
        }
        states.push(state.clone());
        Ok(())
    }

    async fn update(&self, state: &WorkflowState) -> AppResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.progress.lock().unwrap().push(state.items_processed);
        let mut states = self.states.lock().unwrap();
        let slot = states
            .iter_mut()
            .find(|s| s.id == state.id)
            .ok_or_else(|| AppError::NotFound(format!("Workflow {}", state.id)))?;
        *slot = state.clone();
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WorkflowState>> {
        Ok(self.get(id))
    }

    async fn find_resumable(
        &self,
        workflow_type: WorkflowType,
        class_name: Option<&str>,
    ) -> AppResult<Option<WorkflowState>> {
        let states = self.states.lock().unwrap();
        let newest = states
            .iter()
            .filter(|s| s.workflow_type == workflow_type && s.class_name.as_deref() == class_name)
            .max_by_key(|s| s.started_at)
            .cloned();
        Ok(newest.filter(|s| s.is_resumable()))
    }

    async fn list(&self, filter: &WorkflowFilter) -> AppResult<Vec<WorkflowState>> {
        let mut matching: Vec<WorkflowState> = self
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = filter.limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let mut states = self.states.lock().unwrap();
        let before = states.len();
        states.retain(|s| {
            let finished = matches!(s.status, WorkflowStatus::Completed | WorkflowStatus::Failed);
            !(finished && s.completed_at.map_or(false, |at| at < cutoff))
        });
        Ok(before - states.len())
    }
}

/// Reports and builds over a fixed set of ranked fights per combination
#[derive(Default)]
pub struct InMemoryExtractionRepository {
    ranked: Mutex<HashMap<String, Vec<FightRef>>>,
    reports: Mutex<HashMap<String, Report>>,
    builds: Mutex<HashMap<(String, String), Build>>,
}

impl InMemoryExtractionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ranked_fight(&self, combination: &Combination, fight: FightRef) {
        self.ranked
            .lock()
            .unwrap()
            .entry(combination.key())
            .or_default()
            .push(fight);
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    pub fn has_report(&self, key: &str) -> bool {
        self.reports.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ReportRepository for InMemoryExtractionRepository {
    async fn missing_reports(&self, combination: &Combination) -> AppResult<Vec<FightRef>> {
        let ranked = self.ranked.lock().unwrap();
        let reports = self.reports.lock().unwrap();
        Ok(ranked
            .get(&combination.key())
            .map(|fights| {
                fights
                    .iter()
                    .filter(|f| !reports.contains_key(&f.key()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn store_reports(&self, reports: Vec<Report>) -> AppResult<EntityCounts> {
        let mut stored = self.reports.lock().unwrap();
        let mut counts = EntityCounts::default();
        for report in reports {
            let key = format!("{}#{}", report.report_code, report.fight_id);
            if stored.contains_key(&key) {
                counts.unchanged += 1;
            } else {
                stored.insert(key, report);
                counts.new += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl BuildRepository for InMemoryExtractionRepository {
    async fn fights_without_builds(&self, combination: &Combination) -> AppResult<Vec<FightRef>> {
        let ranked = self.ranked.lock().unwrap();
        let reports = self.reports.lock().unwrap();
        let builds = self.builds.lock().unwrap();
        Ok(ranked
            .get(&combination.key())
            .map(|fights| {
                fights
                    .iter()
                    .filter(|f| reports.contains_key(&f.key()))
                    .filter(|f| !builds.contains_key(&(f.key(), f.player_name.clone())))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn store_builds(&self, builds: Vec<Build>) -> AppResult<EntityCounts> {
        let mut stored = self.builds.lock().unwrap();
        let mut counts = EntityCounts::default();
        for build in builds {
            let key = (
                format!("{}#{}", build.report_code, build.fight_id),
                build.player_name.clone(),
            );
            if stored.insert(key, build).is_some() {
                counts.updated += 1;
            } else {
                counts.new += 1;
            }
        }
        Ok(counts)
    }
}

type StepScript = Box<dyn Fn(&Combination, u32) -> AppResult<StepOutcome> + Send + Sync>;

/// Phase step answering from a closure; records every combination it ran
pub struct ScriptedStep {
    phase: Phase,
    script: StepScript,
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
}

impl ScriptedStep {
    pub fn new<F>(phase: Phase, script: F) -> Self
    where
        F: Fn(&Combination, u32) -> AppResult<StepOutcome> + Send + Sync + 'static,
    {
        Self {
            phase,
            script: Box::new(script),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Step that stores one new row per combination
    pub fn succeeding(phase: Phase) -> Self {
        Self::new(phase, |_, _| {
            Ok(StepOutcome {
                counts: EntityCounts {
                    new: 1,
                    ..Default::default()
                },
                api_requests: 1,
            })
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn distinct_seen(&self) -> usize {
        self.seen().into_iter().collect::<HashSet<_>>().len()
    }
}

#[async_trait]
impl PhaseStep for ScriptedStep {
    fn phase(&self) -> Phase {
        self.phase
    }

    async fn run(&self, combination: &Combination, _cancel: &CancellationToken) -> StepResult {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.script)(combination, index);
        if result.is_ok() {
            self.seen.lock().unwrap().push(combination.key());
        }
        result.map_err(StepError::from)
    }
}
