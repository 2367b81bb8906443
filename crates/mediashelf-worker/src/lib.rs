//! Mediashelf Worker Library
//!
//! Job payloads, the [`JobQueue`] seam used by the conversion dispatcher, and an in-process
//! worker pool ([`TaskQueue`]) with retry and capped exponential backoff.

pub mod context;
pub mod job;
pub mod queue;
pub mod recording;

pub use context::{empty_context_weak, JobHandlerContext};
pub use job::{ConversionJob, JobKind, JobStatus, QueuedJob};
pub use queue::{JobFinishedSender, JobQueue, TaskQueue, TaskQueueConfig, MAX_RETRY_BACKOFF_SECS};
pub use recording::RecordingQueue;
