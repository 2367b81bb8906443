//! Job queue: the [`JobQueue`] seam and an in-process worker pool.
//!
//! Shutdown: [`TaskQueue::shutdown`] signals the pool to stop; it does not wait for
//! in-flight jobs. Jobs still buffered in the channel are dropped.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use mediashelf_core::{QueueConfig, TaskError};

use crate::context::JobHandlerContext;
use crate::job::{JobStatus, QueuedJob};

/// Maximum delay in seconds before retrying a failed job. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: u32) -> u64 {
    2_u64
        .checked_pow(retry_count)
        .unwrap_or(MAX_RETRY_BACKOFF_SECS)
        .min(MAX_RETRY_BACKOFF_SECS)
}

/// Notified with the final status of every job the pool runs.
pub type JobFinishedSender = mpsc::Sender<(Uuid, JobStatus)>;

/// Where jobs are sent
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: QueuedJob) -> Result<Uuid>;
}

#[derive(Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub max_retries: u32,
    pub job_timeout_seconds: u64,
    /// Length of one backoff "second"; shortened in tests
    pub backoff_unit: Duration,
    pub channel_capacity: usize,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_retries: 3,
            job_timeout_seconds: 600,
            backoff_unit: Duration::from_secs(1),
            channel_capacity: 1024,
        }
    }
}

impl From<&QueueConfig> for TaskQueueConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    job_tx: mpsc::Sender<QueuedJob>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    /// Start the worker pool on the current tokio runtime.
    pub fn new(
        config: TaskQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        job_finished_tx: Option<JobFinishedSender>,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            Self::worker_pool(config, context, job_rx, shutdown_rx, job_finished_tx).await;
        });

        Self {
            job_tx,
            shutdown_tx,
        }
    }

    async fn worker_pool(
        config: TaskQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        mut job_rx: mpsc::Receiver<QueuedJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
        job_finished_tx: Option<JobFinishedSender>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            max_retries = config.max_retries,
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                job = job_rx.recv() => {
                    let Some(job) = job else { break };

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let ctx = context.clone();
                    let config = config.clone();
                    let finished_tx = job_finished_tx.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let job_id = job.id;
                        let status = match Self::process_job_with_retry(&job, &config, ctx).await {
                            Ok(()) => JobStatus::Completed,
                            Err(e) => {
                                tracing::error!(job_id = %job_id, error = %e, "Job processing failed after retries");
                                JobStatus::Failed
                            }
                        };
                        if let Some(tx) = finished_tx {
                            let _ = tx.send((job_id, status)).await;
                        }
                    });
                }
            }
        }

        tracing::info!("Job queue worker pool stopped");
    }

    #[tracing::instrument(skip(job, config, context), fields(job.id = %job.id, job.kind = %job.kind, job.queue = %job.queue_name()))]
    async fn process_job_with_retry(
        job: &QueuedJob,
        config: &TaskQueueConfig,
        context: Weak<dyn JobHandlerContext>,
    ) -> Result<()> {
        let timeout_duration = Duration::from_secs(config.job_timeout_seconds);
        let mut retry_count: u32 = 0;

        loop {
            let ctx = context
                .upgrade()
                .ok_or_else(|| anyhow!("JobHandlerContext was dropped, cannot process job"))?;

            let error = match tokio::time::timeout(timeout_duration, ctx.dispatch_job(job)).await {
                Ok(Ok(result)) => {
                    tracing::info!(job_id = %job.id, result = %result, "Job completed successfully");
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_) => anyhow!("Job execution timed out"),
            };

            let is_unrecoverable = error
                .downcast_ref::<TaskError>()
                .map(|te| !te.is_recoverable())
                .unwrap_or(false);

            tracing::error!(
                job_id = %job.id,
                error = %error,
                retry_count,
                max_retries = config.max_retries,
                unrecoverable = is_unrecoverable,
                "Job execution failed"
            );

            if is_unrecoverable {
                tracing::error!(
                    job_id = %job.id,
                    "Job failed with unrecoverable error, will not retry"
                );
                return Err(error);
            }

            if retry_count >= config.max_retries {
                tracing::error!(job_id = %job.id, "Job failed after max retries");
                return Err(error);
            }

            let backoff_seconds = compute_retry_backoff_seconds(retry_count);
            retry_count += 1;
            tracing::info!(
                job_id = %job.id,
                retry_count,
                backoff_seconds,
                "Scheduling job retry"
            );
            tokio::time::sleep(config.backoff_unit * backoff_seconds as u32).await;
        }
    }

    /// Signals the worker pool to stop taking new jobs and exit its loop.
    ///
    /// Returns immediately; already-spawned jobs keep running until they complete or time out.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl JobQueue for TaskQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<Uuid> {
        let id = job.id;
        let kind = job.kind.name();
        let queue = job.queue_name().to_string();
        self.job_tx
            .send(job)
            .await
            .map_err(|_| anyhow!("job queue worker pool is not running"))?;

        tracing::info!(job_id = %id, job_kind = kind, queue = %queue, "Job submitted to queue");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::empty_context_weak;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyContext {
        calls: AtomicU32,
        fail_times: u32,
        unrecoverable: bool,
    }

    #[async_trait]
    impl JobHandlerContext for FlakyContext {
        async fn dispatch_job(self: Arc<Self>, _job: &QueuedJob) -> Result<serde_json::Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                if self.unrecoverable {
                    return Err(TaskError::unrecoverable(anyhow!("bad payload")).into());
                }
                return Err(anyhow!("transient"));
            }
            Ok(json!({ "ok": true }))
        }
    }

    fn fast_config(max_retries: u32) -> TaskQueueConfig {
        TaskQueueConfig {
            max_retries,
            backoff_unit: Duration::from_millis(1),
            ..TaskQueueConfig::default()
        }
    }

    fn job() -> QueuedJob {
        QueuedJob::conversions(None, 1, vec!["thumb".to_string()])
    }

    async fn run(context: Arc<FlakyContext>, max_retries: u32) -> JobStatus {
        let weak: Weak<dyn JobHandlerContext> = {
            let ctx: Arc<dyn JobHandlerContext> = context.clone();
            Arc::downgrade(&ctx)
        };
        let (tx, mut rx) = mpsc::channel(4);
        let queue = TaskQueue::new(fast_config(max_retries), weak, Some(tx));
        let id = queue.enqueue(job()).await.unwrap();
        let (finished_id, status) = rx.recv().await.unwrap();
        assert_eq!(finished_id, id);
        queue.shutdown().await;
        status
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(64), MAX_RETRY_BACKOFF_SECS);
    }

    #[tokio::test]
    async fn recoverable_failures_are_retried() {
        let ctx = Arc::new(FlakyContext {
            calls: AtomicU32::new(0),
            fail_times: 2,
            unrecoverable: false,
        });
        assert_eq!(run(ctx.clone(), 3).await, JobStatus::Completed);
        assert_eq!(ctx.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let ctx = Arc::new(FlakyContext {
            calls: AtomicU32::new(0),
            fail_times: u32::MAX,
            unrecoverable: false,
        });
        assert_eq!(run(ctx.clone(), 2).await, JobStatus::Failed);
        assert_eq!(ctx.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unrecoverable_failures_are_not_retried() {
        let ctx = Arc::new(FlakyContext {
            calls: AtomicU32::new(0),
            fail_times: u32::MAX,
            unrecoverable: true,
        });
        assert_eq!(run(ctx.clone(), 3).await, JobStatus::Failed);
        assert_eq!(ctx.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_context_fails_job() {
        let (tx, mut rx) = mpsc::channel(1);
        let queue = TaskQueue::new(fast_config(0), empty_context_weak(), Some(tx));
        queue.enqueue(job()).await.unwrap();
        let (_, status) = rx.recv().await.unwrap();
        assert_eq!(status, JobStatus::Failed);
    }

    #[test]
    fn unrecoverable_task_error_detected() {
        let err: anyhow::Error = TaskError::unrecoverable(anyhow!("bad config")).into();
        let is_unrecoverable = err
            .downcast_ref::<TaskError>()
            .map(|te| !te.is_recoverable())
            .unwrap_or(false);
        assert!(is_unrecoverable);
    }
}
