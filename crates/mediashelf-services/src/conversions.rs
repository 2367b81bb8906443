//! Conversion dispatch and execution
//!
//! [`ConversionDispatcher`] enqueues `perform_conversions` jobs for image media;
//! [`ConversionJobHandler`] is the worker-side context that runs them.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use mediashelf_core::models::Media;
use mediashelf_core::{MediaError, MediaResult, TaskError};
use mediashelf_db::MediaStore;
use mediashelf_processing::ImageManipulator;
use mediashelf_worker::{ConversionJob, JobHandlerContext, JobKind, JobQueue, QueuedJob};
use serde_json::json;
use uuid::Uuid;

/// Caller-requested conversions first, then the channel's, without duplicates
pub fn merge_conversions(requested: &[String], declared: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .chain(declared)
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct ConversionDispatcher {
    queue: Arc<dyn JobQueue>,
    queue_name: Option<String>,
}

impl ConversionDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>, queue_name: Option<String>) -> Self {
        Self { queue, queue_name }
    }

    /// Enqueue one job for `media`. Non-image media and empty lists enqueue nothing.
    pub async fn dispatch(&self, media: &Media, conversions: &[String]) -> MediaResult<Option<Uuid>> {
        if conversions.is_empty() {
            return Ok(None);
        }
        if !media.is_of_kind("image") {
            tracing::debug!(media_id = %media.id, mime_type = %media.mime_type, "Skipping conversions for non-image media");
            return Ok(None);
        }

        let job = QueuedJob::conversions(self.queue_name.clone(), media.id, conversions.to_vec());
        let job_id = self.queue.enqueue(job).await.map_err(|e| MediaError::InternalWithSource {
            message: format!("Failed to enqueue conversions for media {}", media.id),
            source: e,
        })?;

        tracing::info!(
            media_id = %media.id,
            job_id = %job_id,
            conversions = ?conversions,
            "Conversions dispatched"
        );
        Ok(Some(job_id))
    }
}

/// Runs conversion jobs taken from the queue
pub struct ConversionJobHandler {
    media: Arc<dyn MediaStore>,
    manipulator: ImageManipulator,
}

impl ConversionJobHandler {
    pub fn new(media: Arc<dyn MediaStore>, manipulator: ImageManipulator) -> Self {
        Self { media, manipulator }
    }

    /// Generate the job's conversions, skipping the ones already on disk.
    ///
    /// Failures caused only by unknown conversion names make the job unrecoverable; any
    /// other failure is recoverable so the queue retries it.
    #[tracing::instrument(skip(self, job), fields(media_id = %job.media_id))]
    pub async fn perform(&self, job: &ConversionJob) -> Result<serde_json::Value, TaskError> {
        let Some(media) = self.media.find(job.media_id).await? else {
            tracing::warn!("Media no longer exists, nothing to convert");
            return Ok(json!({ "media_id": job.media_id, "missing": true }));
        };

        let report = self
            .manipulator
            .manipulate(&media, &job.conversions, true)
            .await?;

        if report.only_invalid_conversions() {
            return Err(TaskError::unrecoverable(anyhow!(
                "Unknown conversions: {}",
                report.failed_names().join(", ")
            )));
        }
        if !report.is_success() {
            let details: Vec<String> = report
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.conversion, f.error))
                .collect();
            return Err(TaskError::recoverable(anyhow!(
                "Conversions failed: {}",
                details.join("; ")
            )));
        }

        Ok(json!({
            "media_id": media.id,
            "generated": report.generated,
            "skipped": report.skipped,
        }))
    }
}

#[async_trait]
impl JobHandlerContext for ConversionJobHandler {
    async fn dispatch_job(self: Arc<Self>, job: &QueuedJob) -> anyhow::Result<serde_json::Value> {
        match &job.kind {
            JobKind::PerformConversions(conversion_job) => {
                Ok(self.perform(conversion_job).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, TestShelf};
    use bytes::Bytes;
    use mediashelf_storage::Disk;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_conversions_keeps_caller_order() {
        assert_eq!(
            merge_conversions(&names(&["small", "large"]), &names(&["large", "thumb"])),
            names(&["small", "large", "thumb"])
        );
        assert!(merge_conversions(&[], &[]).is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_skips_non_images() {
        let shelf = TestShelf::new();
        let pdf = shelf
            .upload("report.pdf", Bytes::from_static(b"%PDF"))
            .await;
        let image = shelf.upload("photo.png", png_bytes(8, 8)).await;

        let dispatcher = shelf.dispatcher();
        assert_eq!(dispatcher.dispatch(&pdf, &names(&["thumb"])).await.unwrap(), None);
        assert_eq!(dispatcher.dispatch(&image, &[]).await.unwrap(), None);
        assert!(dispatcher
            .dispatch(&image, &names(&["thumb"]))
            .await
            .unwrap()
            .is_some());

        let jobs = shelf.queue.take();
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].kind,
            JobKind::PerformConversions(ConversionJob {
                media_id: image.id,
                conversions: names(&["thumb"]),
            })
        );
    }

    #[tokio::test]
    async fn test_perform_generates_and_is_idempotent() {
        let shelf = TestShelf::new();
        let image = shelf.upload("photo.png", png_bytes(16, 16)).await;
        let handler = shelf.handler();
        let job = ConversionJob {
            media_id: image.id,
            conversions: names(&["thumb"]),
        };

        let first = handler.perform(&job).await.unwrap();
        assert_eq!(first["generated"], json!(["thumb"]));

        let second = handler.perform(&job).await.unwrap();
        assert_eq!(second["generated"], json!([]));
        assert_eq!(second["skipped"], json!(["thumb"]));

        let derived = shelf.layout().path(&image, Some("thumb"));
        assert!(shelf.disk.exists(&derived).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_conversions_are_unrecoverable() {
        let shelf = TestShelf::new();
        let image = shelf.upload("photo.png", png_bytes(16, 16)).await;
        let handler = shelf.handler();

        let err = handler
            .perform(&ConversionJob {
                media_id: image.id,
                conversions: names(&["nope"]),
            })
            .await
            .unwrap_err();
        assert!(!err.is_recoverable());

        let err = handler
            .perform(&ConversionJob {
                media_id: image.id,
                conversions: names(&["nope", "thumb"]),
            })
            .await
            .unwrap_err();
        assert!(!err.is_recoverable());

        // the valid conversion still ran before the job was given up
        let derived = shelf.layout().path(&image, Some("thumb"));
        assert!(shelf.disk.exists(&derived).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_media_is_a_noop() {
        let shelf = TestShelf::new();
        let result = shelf
            .handler()
            .perform(&ConversionJob {
                media_id: 404,
                conversions: names(&["thumb"]),
            })
            .await
            .unwrap();
        assert_eq!(result["missing"], json!(true));
    }
}
