/// Worker pool integration tests: backpressure, rate-limit waits, cancellation
mod utils;

use keystone_sync::modules::provider::domain::queries;
use keystone_sync::shared::domain::Combination;
use keystone_sync::shared::errors::AppError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use utils::factories::pipeline_config;
use utils::fakes::ScriptedClient;
use utils::helpers::build_pool;

fn job(page: u32) -> keystone_sync::modules::jobs::Job {
    queries::rankings_job(&Combination::new("Priest", "Shadow", 12660), page)
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_blocks_submitters_without_dropping_jobs() {
    let mut config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    config.worker.num_workers = 2;
    config.worker.queue_capacity = 2;
    config.sync.batch_concurrency = 1;

    let client = Arc::new(
        ScriptedClient::new(|_, variables, _| Ok(json!({ "page": variables["page"] })))
            .with_latency(Duration::from_millis(200)),
    );
    let cancel = CancellationToken::new();
    let pool = build_pool(&config, Arc::clone(&client), &cancel);
    let mut results = pool.results().expect("first caller gets the results queue");
    assert!(pool.results().is_none());

    // Fill the workers and the queue until a submission has to wait
    let mut accepted = 0u32;
    let mut blocked = false;
    for page in 1..=10 {
        match tokio::time::timeout(Duration::from_millis(50), pool.submit(job(page))).await {
            Ok(result) => {
                result.unwrap();
                accepted += 1;
            }
            Err(_) => {
                blocked = true;
                break;
            }
        }
    }
    assert!(blocked, "submission should wait while the queue is full");
    assert!(accepted <= 4, "at most workers + queue capacity accepted, got {}", accepted);

    // Waiting submissions go through once the workers catch up
    for page in 11..=20 {
        pool.submit(job(page)).await.unwrap();
    }
    let total = accepted + 10;

    let mut received = 0;
    while received < total {
        let result = results.recv().await.expect("results queue open");
        assert!(result.is_success());
        received += 1;
    }

    assert_eq!(client.calls(), total);
    assert!(client.max_in_flight() <= 2);

    let stats = pool.stats();
    assert_eq!(stats.completed_jobs, u64::from(total));
    assert_eq!(stats.failed_jobs, 0);
    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_worker_sleeps_through_rate_limits() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = Arc::new(ScriptedClient::new(|_, _, index| {
        if index < 2 {
            Err(AppError::RateLimited {
                retry_after: Duration::from_secs(1),
            })
        } else {
            Ok(json!({ "ok": true }))
        }
    }));
    let cancel = CancellationToken::new();
    let pool = build_pool(&config, Arc::clone(&client), &cancel);

    let started = tokio::time::Instant::now();
    let result = pool
        .submit_and_wait(job(1), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.rate_limit_retries, 2);
    assert_eq!(result.api_requests(), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(pool.stats().rate_limit_waits, 2);
    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_beyond_ceiling_is_returned() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = Arc::new(ScriptedClient::new(|_, _, _| {
        Err(AppError::RateLimited {
            retry_after: Duration::from_secs(3600),
        })
    }));
    let cancel = CancellationToken::new();
    let pool = build_pool(&config, Arc::clone(&client), &cancel);

    let result = pool
        .submit_and_wait(job(1), &CancellationToken::new())
        .await
        .unwrap();

    match result.outcome {
        Err(AppError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Duration::from_secs(3600))
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
    assert_eq!(client.calls(), 1);
    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_fails_in_flight_and_queued_jobs() {
    let mut config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    config.worker.num_workers = 1;
    config.sync.batch_concurrency = 1;

    let client = Arc::new(
        ScriptedClient::new(|_, _, _| Ok(json!({}))).with_latency(Duration::from_secs(60)),
    );
    let cancel = CancellationToken::new();
    let pool = build_pool(&config, Arc::clone(&client), &cancel);

    let mut waiters = Vec::new();
    for page in 1..=3 {
        let pool = Arc::clone(&pool);
        waiters.push(tokio::spawn(async move {
            pool.submit_and_wait(job(page), &CancellationToken::new()).await
        }));
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    for waiter in waiters {
        let result = waiter.await.unwrap().unwrap();
        assert!(
            matches!(result.outcome, Err(AppError::Cancelled(_))),
            "expected cancellation, got {:?}",
            result.outcome
        );
    }
    assert_eq!(client.calls(), 1);
    pool.stop().await;
}
