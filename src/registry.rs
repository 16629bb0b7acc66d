//! The job registry: creation, chunk intake, and status queries.
//!
//! # Concurrency
//!
//! Jobs live in a `DashMap<JobId, Arc<Mutex<JobRecord>>>`. The map's shard
//! lock is held only long enough to clone the record's `Arc`; all work on
//! a job happens under that job's own mutex, so uploads and polls for
//! unrelated jobs never contend.
//!
//! The job mutex is never held across an `.await`. Chunk intake therefore
//! runs in three steps: check the status and take a sequence index under
//! the lock, persist the chunk with no lock held, then commit under the
//! lock. The commit that brings `received` to `expected` flips the job to
//! `Processing` and is the only one that dispatches background work. A
//! commit arriving after that is rejected and its chunk is left unused.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::JobRecord;
use crate::error::{JobError, Result};
use crate::observer::{JobObserver, NoopObserver};
use crate::store::ChunkStore;
use crate::types::job::{
    ChunkHandle, ChunkReceipt, JobId, JobSnapshot, JobStatus, OutputHandle,
};

type SharedRecord = Arc<Mutex<JobRecord>>;

/// Receives jobs whose intake just closed.
///
/// [`JobOrchestrator`](crate::orchestrator::JobOrchestrator) is the
/// production implementation. `dispatch` is called exactly once per job,
/// from the request that delivered the last chunk, and must not block.
pub trait Dispatch: Send + Sync {
    /// Starts background combination for `job`.
    fn dispatch(&self, job: JobSlot);
}

/// Registry-mediated access to one job for the dispatcher.
///
/// A slot exposes only the post-intake state machine steps. Each step
/// takes the job's lock for the transition alone and reports it to the
/// registry's [`JobObserver`].
#[derive(Clone)]
pub struct JobSlot {
    id: JobId,
    record: SharedRecord,
    observer: Arc<dyn JobObserver>,
}

impl std::fmt::Debug for JobSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSlot").field("id", &self.id).finish_non_exhaustive()
    }
}

impl JobSlot {
    /// The job's ID.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// `Processing -> Merging`. Returns the chunk handles in arrival order.
    pub fn begin_merge(&self) -> Result<Vec<ChunkHandle>> {
        self.apply(JobRecord::begin_merge)
    }

    /// `Merging -> Completed`, publishing `output`.
    pub fn complete(&self, output: OutputHandle) -> Result<()> {
        self.apply(|record| record.complete(output))
    }

    /// `Merging -> Failed`, recording `error`.
    pub fn fail(&self, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        self.apply(|record| record.fail(error))
    }

    /// Current snapshot of the job.
    pub fn snapshot(&self) -> JobSnapshot {
        self.record.lock().snapshot()
    }

    fn apply<T>(&self, step: impl FnOnce(&mut JobRecord) -> Result<T>) -> Result<T> {
        let (from, result, to) = {
            let mut record = self.record.lock();
            let from = record.status();
            let result = step(&mut record);
            (from, result, record.status())
        };
        if from != to {
            self.observer.on_status_changed(&self.id, from, to);
        }
        result
    }
}

/// Owns every job for the lifetime of the process.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use bytes::Bytes;
/// use reelmerge::registry::{Dispatch, JobRegistry, JobSlot};
/// use reelmerge::store::MemoryStore;
/// use reelmerge::JobStatus;
///
/// struct Ignore;
/// impl Dispatch for Ignore {
///     fn dispatch(&self, _job: JobSlot) {}
/// }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let registry = JobRegistry::new(Arc::new(MemoryStore::new()), Arc::new(Ignore));
/// let id = registry.create_job(2).unwrap();
///
/// let receipt = registry.add_chunk(&id, Bytes::from_static(b"a")).await.unwrap();
/// assert_eq!((receipt.received, receipt.total), (1, 2));
/// assert_eq!(registry.get_status(&id).unwrap().status, JobStatus::Waiting);
///
/// registry.add_chunk(&id, Bytes::from_static(b"b")).await.unwrap();
/// assert_eq!(registry.get_status(&id).unwrap().status, JobStatus::Processing);
/// # });
/// ```
pub struct JobRegistry {
    jobs: DashMap<JobId, SharedRecord>,
    chunks: Arc<dyn ChunkStore>,
    dispatcher: Arc<dyn Dispatch>,
    observer: Arc<dyn JobObserver>,
    max_expected_chunks: u32,
}

impl JobRegistry {
    /// Creates an empty registry persisting chunks to `chunks` and handing
    /// completed intakes to `dispatcher`.
    pub fn new(chunks: Arc<dyn ChunkStore>, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            jobs: DashMap::new(),
            chunks,
            dispatcher,
            observer: Arc::new(NoopObserver),
            max_expected_chunks: u32::MAX,
        }
    }

    /// Installs a lifecycle observer.
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Caps the `expected_count` accepted by [`create_job`](Self::create_job).
    pub fn with_max_expected_chunks(mut self, max: u32) -> Self {
        self.max_expected_chunks = max;
        self
    }

    /// Creates a job waiting for `expected_count` chunks.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidArgument`] if `expected_count` is not positive or
    /// exceeds the configured maximum. No job is created.
    pub fn create_job(&self, expected_count: i64) -> Result<JobId> {
        if expected_count <= 0 {
            return Err(JobError::invalid_argument(format!(
                "expected chunk count must be positive, got {expected_count}"
            )));
        }
        let expected = u32::try_from(expected_count)
            .ok()
            .filter(|n| *n <= self.max_expected_chunks)
            .ok_or_else(|| {
                JobError::invalid_argument(format!(
                    "expected chunk count {expected_count} exceeds the limit of {}",
                    self.max_expected_chunks
                ))
            })?;

        let record = JobRecord::new(expected);
        let id = record.id().clone();
        self.jobs.insert(id.clone(), Arc::new(Mutex::new(record)));

        self.observer.on_created(&id, expected);
        Ok(id)
    }

    /// Persists one chunk for job `id` and records it.
    ///
    /// The final expected chunk moves the job to `Processing` and
    /// dispatches its combination; this happens for exactly one call even
    /// when several uploads race to deliver the last chunk.
    ///
    /// # Errors
    ///
    /// - [`JobError::InvalidArgument`] if `data` is empty.
    /// - [`JobError::NotFound`] if the job does not exist.
    /// - [`JobError::InvalidState`] if the job is past `Waiting`, either on
    ///   arrival or by the time this chunk finished persisting.
    /// - [`JobError::Storage`] if persistence fails; the job is unchanged.
    pub async fn add_chunk(&self, id: &JobId, data: Bytes) -> Result<ChunkReceipt> {
        if data.is_empty() {
            return Err(JobError::invalid_argument("chunk payload is empty"));
        }
        let record = self.record(id)?;

        let sequence = record.lock().begin_upload()?;

        let handle = match self.chunks.persist(id, sequence, data).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(job_id = %id, sequence, error = %e, "chunk persistence failed");
                return Err(e.into());
            },
        };

        let commit = match record.lock().commit_chunk(handle) {
            Ok(commit) => commit,
            Err(e) => {
                tracing::debug!(job_id = %id, sequence, "chunk arrived after intake closed");
                return Err(e);
            },
        };
        tracing::debug!(
            job_id = %id,
            sequence,
            received = commit.receipt.received,
            total = commit.receipt.total,
            "chunk accepted"
        );

        if commit.dispatch {
            self.observer
                .on_status_changed(id, JobStatus::Waiting, JobStatus::Processing);
            self.dispatcher.dispatch(JobSlot {
                id: id.clone(),
                record,
                observer: Arc::clone(&self.observer),
            });
        }
        Ok(commit.receipt)
    }

    /// Returns a consistent snapshot of job `id`.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] if the job does not exist.
    pub fn get_status(&self, id: &JobId) -> Result<JobSnapshot> {
        Ok(self.record(id)?.lock().snapshot())
    }

    /// Returns the output of a completed job.
    ///
    /// # Errors
    ///
    /// - [`JobError::NotFound`] if the job does not exist.
    /// - [`JobError::NotReady`] unless the job is `Completed`.
    pub fn get_output(&self, id: &JobId) -> Result<OutputHandle> {
        self.record(id)?.lock().output()
    }

    /// Subscribes to status changes of job `id`.
    pub fn subscribe(&self, id: &JobId) -> Result<watch::Receiver<JobStatus>> {
        Ok(self.record(id)?.lock().subscribe())
    }

    /// Waits until job `id` reaches a terminal status and returns its
    /// final snapshot.
    pub async fn wait_for_terminal(&self, id: &JobId) -> Result<JobSnapshot> {
        let mut rx = self.subscribe(id)?;
        rx.wait_for(JobStatus::is_terminal)
            .await
            .map_err(|_| JobError::not_found(id))?;
        self.get_status(id)
    }

    /// Number of jobs ever created.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if no job has been created.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn record(&self, id: &JobId) -> Result<SharedRecord> {
        self.jobs
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| JobError::not_found(id))
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.jobs.len())
            .field("max_expected_chunks", &self.max_expected_chunks)
            .finish_non_exhaustive()
    }
}
