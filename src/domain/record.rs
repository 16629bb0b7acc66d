//! The registry's internal representation of a job.
//!
//! Every method here assumes the caller holds the job's lock. The record
//! itself never blocks and never awaits.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::JobError;
use crate::types::job::{ChunkHandle, ChunkReceipt, JobId, JobSnapshot, JobStatus, OutputHandle};

/// Internal storage representation of a job.
///
/// Uploads take a sequence index up front and are persisted without the
/// lock held. Only the commit step counts a chunk, and it refuses any
/// commit once `received == expected`, so the commit that closes intake
/// is always the last one accepted.
#[derive(Debug)]
pub(crate) struct JobRecord {
    id: JobId,
    expected: u32,
    received: u32,
    chunks: Vec<ChunkHandle>,
    status: JobStatus,
    output: Option<OutputHandle>,
    error: Option<String>,
    next_sequence: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status_tx: watch::Sender<JobStatus>,
}

/// Outcome of committing a persisted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Commit {
    pub receipt: ChunkReceipt,
    /// `true` for exactly one commit per job: the one that closed intake.
    pub dispatch: bool,
}

impl JobRecord {
    /// Creates a record in the `Waiting` state. `expected` must be positive;
    /// the registry validates it before calling.
    pub(crate) fn new(expected: u32) -> Self {
        let now = Utc::now();
        let (status_tx, _) = watch::channel(JobStatus::Waiting);
        Self {
            id: JobId::new(),
            expected,
            received: 0,
            chunks: Vec::with_capacity(expected.min(64) as usize),
            status: JobStatus::Waiting,
            output: None,
            error: None,
            next_sequence: 0,
            created_at: now,
            updated_at: now,
            status_tx,
        }
    }

    pub(crate) fn id(&self) -> &JobId {
        &self.id
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.status
    }

    /// Starts an upload and returns its sequence index.
    ///
    /// Fails only if the job is no longer `Waiting`. Sequence indexes are
    /// never reused, even when the upload later fails.
    pub(crate) fn begin_upload(&mut self) -> Result<u32, JobError> {
        if self.status != JobStatus::Waiting {
            return Err(JobError::invalid_state(
                &self.id,
                self.status,
                "job is no longer accepting chunks",
            ));
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Ok(sequence)
    }

    /// Records a persisted chunk and, if it was the last one expected,
    /// moves the job to `Processing`.
    ///
    /// A commit that lands after intake closed is rejected and leaves the
    /// record unchanged.
    pub(crate) fn commit_chunk(&mut self, handle: ChunkHandle) -> Result<Commit, JobError> {
        if self.status != JobStatus::Waiting || self.received >= self.expected {
            return Err(JobError::invalid_state(
                &self.id,
                self.status,
                "job closed intake while the chunk was uploading",
            ));
        }

        self.chunks.push(handle);
        self.received += 1;
        self.touch();

        let dispatch = self.received == self.expected;
        if dispatch {
            self.transition(JobStatus::Processing)?;
        }

        Ok(Commit {
            receipt: ChunkReceipt {
                received: self.received,
                total: self.expected,
            },
            dispatch,
        })
    }

    /// Moves to `Merging` and returns the chunk handles in arrival order.
    pub(crate) fn begin_merge(&mut self) -> Result<Vec<ChunkHandle>, JobError> {
        self.transition(JobStatus::Merging)?;
        Ok(self.chunks.clone())
    }

    pub(crate) fn complete(&mut self, output: OutputHandle) -> Result<(), JobError> {
        self.transition(JobStatus::Completed)?;
        self.output = Some(output);
        Ok(())
    }

    pub(crate) fn fail(&mut self, error: String) -> Result<(), JobError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// Returns the output handle, or `NotReady` unless the job completed.
    pub(crate) fn output(&self) -> Result<OutputHandle, JobError> {
        match (&self.status, &self.output) {
            (JobStatus::Completed, Some(output)) => Ok(output.clone()),
            _ => Err(JobError::NotReady {
                job_id: self.id.clone(),
                status: self.status,
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            received: self.received,
            total: self.expected,
            error: self.error.clone(),
            created_at: format_time(self.created_at),
            updated_at: format_time(self.updated_at),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        self.status.validate_transition(&self.id, &next)?;
        self.status = next;
        self.touch();
        self.status_tx.send_replace(next);
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
