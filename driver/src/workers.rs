//! Queue-worker actors (component C12): one Tokio task per worker slot,
//! looping over a blocking pop from its assigned priority queue and driving
//! the judge pipeline.
//!
//! Grounded on the teacher's `workers.rs` (spawn-N-threads-and-join shape),
//! adapted to `tokio::spawn` since the rest of the stack is async.

use std::sync::Arc;

use tm_api::ApiClient;
use tm_container::ContainerDriver;
use tm_model::QueueKind;
use tm_path::PathContext;
use tm_task::context::{JudgeContext, QueueClient, TelemetryClient};

use crate::config::AppConfig;
use crate::queue::RedisQueueClient;

error_chain::error_chain! {
    foreign_links {
        Join(tokio::task::JoinError);
    }

    errors {
        InvalidNumberOfWorkers {
            description("invalid number of workers")
        }
    }
}

const IDLE_BACKOFF: std::time::Duration = std::time::Duration::from_millis(500);

/// Spawn `config.workers` tasks per queue kind and block until all of them
/// exit (they loop forever in normal operation, so this only returns on a
/// worker panic).
pub async fn run(
    config: Arc<AppConfig>,
    queue: Arc<RedisQueueClient>,
    api_client: ApiClient,
    container_driver: ContainerDriver,
) -> Result<()> {
    if config.workers == 0 {
        log::error!("number of workers cannot be 0");
        return Err(Error::from(ErrorKind::InvalidNumberOfWorkers));
    }

    log::info!("spawning {} workers per queue", config.workers);

    let mut handles = Vec::new();
    for kind in [QueueKind::Normal, QueueKind::Rejudge, QueueKind::Retry] {
        for worker_id in 1..=config.workers {
            let queue = queue.clone();
            let api_client = api_client.clone();
            let container_driver = container_driver.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(kind, worker_id, queue, api_client, container_driver, config).await;
            }));
        }
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}

async fn worker_loop(
    kind: QueueKind,
    worker_id: u32,
    queue: Arc<RedisQueueClient>,
    api_client: ApiClient,
    container_driver: ContainerDriver,
    config: Arc<AppConfig>,
) {
    log::info!("{:?} worker #{} started", kind, worker_id);

    loop {
        let request = match queue.pop_one(kind).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                tokio::time::sleep(IDLE_BACKOFF).await;
                continue;
            }
            Err(e) => {
                log::error!("{:?} worker #{} failed to pop from queue: {}", kind, worker_id, e);
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        let path_ctx = PathContext::new(
            config.host_workspace_root.clone(),
            config.s3fs_root.clone(),
            request.id,
        );
        let telemetry = TelemetryClient::new(config.sentry_dsn.clone());
        let queue_client: Arc<dyn QueueClient> = queue.clone();

        let mut ctx = JudgeContext::new(
            request.clone(),
            api_client.clone(),
            container_driver.clone(),
            path_ctx,
            telemetry,
            queue_client,
            config.profile,
        );

        let result = if kind == QueueKind::Retry {
            tm_judge::pipeline::run_retry_dispatch_pipeline(&mut ctx, &request).await
        } else {
            tm_judge::pipeline::run_judge_pipeline(&mut ctx).await
        };

        if let Err(e) = result {
            log::error!("judge request {} failed: {}", request.id, e);
            if let Err(requeue_err) = ctx.queue_client.enqueue(QueueKind::Retry, &request).await {
                log::error!("judge request {} failed to re-enqueue onto the retry queue: {}", request.id, requeue_err);
            }
        }
    }
}
