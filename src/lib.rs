pub mod modules;
pub mod schema;
pub mod shared;

use modules::{
    extraction::{BuildsStep, ExtractionRepositoryImpl, ReportsStep},
    jobs::{WorkerPool, WorkerPoolConfig},
    provider::{DataSourceClient, WarcraftLogsClient},
    rankings::{
        application::{BatchProcessorConfig, SyncServiceConfig},
        BatchProcessor, RankingRepositoryImpl, SyncService,
    },
    scheduler::SchedulerService,
    workflow::{
        AnalysisStep, Phase, PhaseOrchestrator, SqlStatisticsAggregator, WorkflowRepositoryImpl,
        WorkflowRunner,
    },
};
use shared::errors::AppResult;
use shared::utils::{init_logger, RateLimiter};
use shared::{Database, PipelineConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Every long-lived component of a running pipeline
pub struct Pipeline {
    pub pool: Arc<WorkerPool>,
    pub runner: WorkflowRunner,
    pub scheduler: SchedulerService,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Wire the services on top of a database and a data-source client
    pub async fn build(
        config: PipelineConfig,
        database: Database,
        client: Arc<dyn DataSourceClient>,
    ) -> AppResult<Self> {
        let cancel = CancellationToken::new();

        let limiter = Arc::new(RateLimiter::new(
            config.worker.requests_per_second,
            config.worker.burst,
        )?);
        let pool = Arc::new(WorkerPool::new(
            WorkerPoolConfig::from_settings(&config.worker),
            client,
            limiter,
        ));
        pool.start(cancel.clone())?;

        let processor = Arc::new(BatchProcessor::new(
            Arc::clone(&pool),
            BatchProcessorConfig::from(&config.batch),
        ));
        let sync = Arc::new(SyncService::new(
            Arc::clone(&processor),
            Arc::new(RankingRepositoryImpl::new(database.clone())),
            SyncServiceConfig::from(&config),
        ));

        let extraction = Arc::new(ExtractionRepositoryImpl::new(database.clone()));
        let aggregator = Arc::new(SqlStatisticsAggregator::new(database.clone()));
        let workflows = Arc::new(WorkflowRepositoryImpl::new(database));

        let mut orchestrator =
            PhaseOrchestrator::new(workflows.clone(), sync, config.workflow.phase_timeout())
                .with_step(Arc::new(ReportsStep::new(
                    Arc::clone(&processor),
                    extraction.clone(),
                )))
                .with_step(Arc::new(BuildsStep::new(Arc::clone(&processor), extraction)));
        for phase in Phase::ANALYSIS {
            orchestrator =
                orchestrator.with_step(Arc::new(AnalysisStep::new(phase, aggregator.clone())?));
        }

        let definitions = config.schedule_definitions()?;
        let runner = WorkflowRunner::new(orchestrator, workflows, config, cancel.clone());

        let scheduler = SchedulerService::new(Arc::new(runner.clone())).await?;
        for (scope, schedule) in definitions {
            scheduler.register(scope, schedule).await?;
        }

        Ok(Self {
            pool,
            runner,
            scheduler,
            cancel,
        })
    }

    /// Stop triggering, cancel running executions and drain the worker pool
    pub async fn shutdown(&self) -> AppResult<()> {
        self.scheduler.shutdown().await?;
        self.runner.shutdown();
        self.cancel.cancel();
        self.pool.stop().await;
        Ok(())
    }
}

/// Daemon entry point: load configuration, migrate, schedule and wait for Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_logger();

    let config = PipelineConfig::load()?;
    let database = Database::new()?;
    database.run_migrations()?;

    let client: Arc<dyn DataSourceClient> = Arc::new(WarcraftLogsClient::new(&config.api)?);
    let pipeline = Pipeline::build(config, database, client).await?;

    if let Err(e) = pipeline.runner.prune_history().await {
        log_warn!("Could not prune workflow history: {}", e);
    }

    pipeline.scheduler.start().await?;
    log_info!("keystone-sync running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    log_info!("Shutdown requested");
    pipeline.shutdown().await?;
    Ok(())
}
