//! Lifecycle hooks.
//!
//! A [`JobObserver`] is told about every job the registry creates and
//! every status transition, after the job's lock has been released. It is
//! the extension point for retention policies, metrics, or notifications;
//! the registry itself never evicts jobs.

use crate::types::job::{JobId, JobStatus};

/// Receives job lifecycle events.
///
/// Both methods default to doing nothing. Implementations are called from
/// request handlers and merge workers, so they must return quickly.
pub trait JobObserver: Send + Sync {
    /// A job was created with `expected` chunks.
    fn on_created(&self, _job_id: &JobId, _expected: u32) {}

    /// A job moved from `from` to `to`.
    fn on_status_changed(&self, _job_id: &JobId, _from: JobStatus, _to: JobStatus) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Observer that logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn on_created(&self, job_id: &JobId, expected: u32) {
        tracing::info!(job_id = %job_id, expected, "job created");
    }

    fn on_status_changed(&self, job_id: &JobId, from: JobStatus, to: JobStatus) {
        if to == JobStatus::Failed {
            tracing::warn!(job_id = %job_id, %from, %to, "job status changed");
        } else {
            tracing::info!(job_id = %job_id, %from, %to, "job status changed");
        }
    }
}
