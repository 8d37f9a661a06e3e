/// Test helper functions and service builders
use super::fakes::{InMemoryRankingRepository, InMemoryWorkflowRepository, ScriptedClient};
use keystone_sync::modules::jobs::{WorkerPool, WorkerPoolConfig};
use keystone_sync::modules::rankings::application::{BatchProcessorConfig, SyncServiceConfig};
use keystone_sync::modules::rankings::{BatchProcessor, SyncService};
use keystone_sync::modules::workflow::domain::PhaseStep;
use keystone_sync::modules::workflow::{PhaseOrchestrator, WorkflowRunner};
use keystone_sync::shared::utils::RateLimiter;
use keystone_sync::shared::PipelineConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct TestPipeline {
    pub client: Arc<ScriptedClient>,
    pub pool: Arc<WorkerPool>,
    pub processor: Arc<BatchProcessor>,
    pub sync: Arc<SyncService>,
    pub rankings: Arc<InMemoryRankingRepository>,
    pub workflows: Arc<InMemoryWorkflowRepository>,
    pub cancel: CancellationToken,
}

/// Started worker pool over `client`, configured from `config`
pub fn build_pool(config: &PipelineConfig, client: Arc<ScriptedClient>, cancel: &CancellationToken) -> Arc<WorkerPool> {
    let limiter = Arc::new(
        RateLimiter::new(config.worker.requests_per_second, config.worker.burst)
            .expect("valid limiter settings"),
    );
    let pool = Arc::new(WorkerPool::new(
        WorkerPoolConfig::from_settings(&config.worker),
        client,
        limiter,
    ));
    pool.start(cancel.clone()).expect("pool starts once");
    pool
}

/// Build the fetch services over in-memory storage; must run inside a runtime
pub fn build_test_pipeline(config: &PipelineConfig, client: ScriptedClient) -> TestPipeline {
    let cancel = CancellationToken::new();
    let client = Arc::new(client);
    let pool = build_pool(config, Arc::clone(&client), &cancel);

    let processor = Arc::new(BatchProcessor::new(
        Arc::clone(&pool),
        BatchProcessorConfig::from(&config.batch),
    ));
    let rankings = Arc::new(InMemoryRankingRepository::new());
    let sync = Arc::new(SyncService::new(
        Arc::clone(&processor),
        rankings.clone(),
        SyncServiceConfig::from(config),
    ));

    TestPipeline {
        client,
        pool,
        processor,
        sync,
        rankings,
        workflows: Arc::new(InMemoryWorkflowRepository::new()),
        cancel,
    }
}

/// Runner whose orchestrator has the given sequential steps
pub fn build_runner(
    pipeline: &TestPipeline,
    config: PipelineConfig,
    steps: Vec<Arc<dyn PhaseStep>>,
) -> WorkflowRunner {
    let mut orchestrator = PhaseOrchestrator::new(
        pipeline.workflows.clone(),
        Arc::clone(&pipeline.sync),
        config.workflow.phase_timeout(),
    );
    for step in steps {
        orchestrator = orchestrator.with_step(step);
    }
    WorkflowRunner::new(orchestrator, pipeline.workflows.clone(), config, pipeline.cancel.clone())
}
