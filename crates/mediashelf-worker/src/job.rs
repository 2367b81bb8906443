use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate derived artifacts for one media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub media_id: i64,
    pub conversions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    PerformConversions(ConversionJob),
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::PerformConversions(_) => "perform_conversions",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A job as handed to a [`JobQueue`](crate::JobQueue)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    /// Target queue; `None` is the default queue
    pub queue: Option<String>,
    pub kind: JobKind,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn new(queue: Option<String>, kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue,
            kind,
            enqueued_at: Utc::now(),
        }
    }

    pub fn conversions(queue: Option<String>, media_id: i64, conversions: Vec<String>) -> Self {
        Self::new(
            queue,
            JobKind::PerformConversions(ConversionJob {
                media_id,
                conversions,
            }),
        )
    }

    pub fn queue_name(&self) -> &str {
        self.queue.as_deref().unwrap_or("default")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
}
