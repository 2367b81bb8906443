//! Job handler context trait
//!
//! The application implements this trait for its service state. The worker calls
//! `dispatch_job` for each job it runs; the implementation matches on the job kind.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use crate::job::QueuedJob;

/// Context for job dispatch.
///
/// The worker holds a weak reference so the pool never keeps the application state alive.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    /// Run the job and return a JSON summary of the result.
    async fn dispatch_job(self: Arc<Self>, job: &QueuedJob) -> Result<serde_json::Value>;
}

struct NoopContext;

#[async_trait]
impl JobHandlerContext for NoopContext {
    async fn dispatch_job(self: Arc<Self>, _job: &QueuedJob) -> Result<serde_json::Value> {
        Err(anyhow!("no job handler context available"))
    }
}

/// A weak reference that never upgrades. Placeholder until the real context exists.
pub fn empty_context_weak() -> Weak<dyn JobHandlerContext> {
    let n: Arc<dyn JobHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}
