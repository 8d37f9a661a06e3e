/// Batch processor retry behavior through a real worker pool
mod utils;

use keystone_sync::modules::provider::domain::queries;
use keystone_sync::modules::rankings::domain::{RankingBatch, SyncMetrics};
use keystone_sync::shared::domain::Combination;
use keystone_sync::shared::errors::AppError;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use utils::factories::{pipeline_config, players, rankings_payload};
use utils::fakes::ScriptedClient;
use utils::helpers::build_test_pipeline;

fn shadow_priest() -> Combination {
    Combination::new("Priest", "Shadow", 12660)
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_batch_waits_and_succeeds() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = ScriptedClient::new(|_, _, index| {
        if index < 2 {
            Err(AppError::RateLimited {
                retry_after: Duration::from_secs(1),
            })
        } else {
            Ok(rankings_payload(&players("p", 5), false))
        }
    });
    let pipeline = build_test_pipeline(&config, client);

    let started = tokio::time::Instant::now();
    let result = pipeline
        .processor
        .process_batch(&RankingBatch::first(shadow_priest(), 50), &CancellationToken::new())
        .await;

    assert!(result.is_success(), "unexpected error {:?}", result.error);
    assert_eq!(result.retries, 2);
    assert_eq!(result.api_requests, 3);
    assert_eq!(result.rankings.len(), 5);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_sync_stores_every_returned_ranking() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = ScriptedClient::new(|_, _, index| {
        if index < 2 {
            Err(AppError::RateLimited {
                retry_after: Duration::from_secs(1),
            })
        } else {
            Ok(rankings_payload(&players("p", 7), false))
        }
    });
    let pipeline = build_test_pipeline(&config, client);

    let outcome = pipeline
        .sync
        .sync_combination(&shadow_priest(), &SyncMetrics::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.retries, 2);
    assert_eq!(outcome.counts.new, 7);
    assert_eq!(pipeline.rankings.stored(&shadow_priest()).len(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = ScriptedClient::new(|_, _, index| {
        if index < 2 {
            Err(AppError::TransientError("connection reset".into()))
        } else {
            Ok(json!({ "ok": true }))
        }
    });
    let pipeline = build_test_pipeline(&config, client);

    let run = pipeline
        .processor
        .run_job(queries::rankings_job(&shadow_priest(), 1), &CancellationToken::new())
        .await;

    assert!(run.outcome.is_ok());
    assert_eq!(run.retries, 2);
    assert_eq!(run.api_requests, 3);
    assert_eq!(pipeline.client.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_give_up_after_max_attempts() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = ScriptedClient::new(|_, _, _| Err(AppError::TransientError("HTTP 502".into())));
    let pipeline = build_test_pipeline(&config, client);

    let run = pipeline
        .processor
        .run_job(queries::rankings_job(&shadow_priest(), 1), &CancellationToken::new())
        .await;

    assert!(matches!(run.outcome, Err(AppError::TransientError(_))));
    assert_eq!(pipeline.client.calls(), config.batch.max_attempts);
}

#[tokio::test]
async fn test_malformed_payload_is_not_retried() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = ScriptedClient::new(|_, _, _| Ok(json!({ "worldData": { "encounter": null } })));
    let pipeline = build_test_pipeline(&config, client);

    let result = pipeline
        .processor
        .process_batch(&RankingBatch::first(shadow_priest(), 50), &CancellationToken::new())
        .await;

    assert!(matches!(result.error, Some(AppError::ValidationError(_))));
    assert!(result.rankings.is_empty());
    assert_eq!(pipeline.client.calls(), 1);
}

#[tokio::test]
async fn test_fatal_errors_are_returned_at_once() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = ScriptedClient::new(|_, _, _| Err(AppError::FatalError("Not authorized: HTTP 401".into())));
    let pipeline = build_test_pipeline(&config, client);

    let run = pipeline
        .processor
        .run_job(queries::rankings_job(&shadow_priest(), 1), &CancellationToken::new())
        .await;

    assert!(matches!(run.outcome, Err(AppError::FatalError(_))));
    assert_eq!(run.retries, 0);
    assert_eq!(pipeline.client.calls(), 1);
}

#[tokio::test]
async fn test_page_is_truncated_to_batch_size() {
    let config = pipeline_config(&[("Priest", &["Shadow"])], &[12660]);
    let client = ScriptedClient::new(|_, _, _| Ok(rankings_payload(&players("p", 10), true)));
    let pipeline = build_test_pipeline(&config, client);

    let result = pipeline
        .processor
        .process_batch(&RankingBatch::first(shadow_priest(), 4), &CancellationToken::new())
        .await;

    assert!(result.is_success());
    assert!(result.has_more_pages);
    assert_eq!(result.rankings.len(), 4);
    assert_eq!(result.rankings[0].player_name, "p1");
    assert_eq!(result.rankings[0].keystone_level, 18);
}
