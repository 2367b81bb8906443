use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::job::QueuedJob;
use crate::queue::JobQueue;

/// Queue that only records what was enqueued
#[derive(Clone, Default)]
pub struct RecordingQueue {
    jobs: Arc<Mutex<Vec<QueuedJob>>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<QueuedJob> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    /// Drain the recorded jobs
    pub fn take(&self) -> Vec<QueuedJob> {
        self.jobs
            .lock()
            .map(|mut jobs| std::mem::take(&mut *jobs))
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<Uuid> {
        let id = job.id;
        self.jobs
            .lock()
            .map_err(|_| anyhow!("recording queue lock poisoned"))?
            .push(job);
        Ok(id)
    }
}
