//! Background combination of jobs whose intake has closed.
//!
//! Each dispatched job gets its own tokio task. A semaphore bounds how
//! many combinations run at once; jobs beyond the limit stay in
//! `Processing` until a permit frees up. A failing or panicking combiner
//! marks only its own job `Failed`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;

use crate::combine::Combiner;
use crate::error::CombineError;
use crate::registry::{Dispatch, JobSlot};

/// Runs the `Processing -> Merging -> Completed | Failed` half of the
/// lifecycle.
///
/// `dispatch` must be called from within a tokio runtime.
#[derive(Clone)]
pub struct JobOrchestrator {
    combiner: Arc<dyn Combiner>,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("available_permits", &self.permits.available_permits())
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    /// Creates an orchestrator running at most `max_concurrent` combines
    /// at a time. A limit of zero is treated as one.
    pub fn new(combiner: Arc<dyn Combiner>, max_concurrent: usize) -> Self {
        Self {
            combiner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of jobs currently in `Merging`.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    async fn run(self, job: JobSlot) {
        // The semaphore is never closed, so acquisition only waits.
        let _permit = self.permits.acquire().await.ok();

        let chunks = match job.begin_merge() {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!(job_id = %job.id(), error = %e, "cannot start merge");
                return;
            },
        };

        self.active.fetch_add(1, Ordering::SeqCst);
        let outcome = AssertUnwindSafe(self.combiner.combine(job.id(), &chunks))
            .catch_unwind()
            .await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let recorded = match outcome {
            Ok(Ok(output)) => {
                tracing::info!(job_id = %job.id(), output = %output, chunks = chunks.len(), "merge completed");
                job.complete(output)
            },
            Ok(Err(e)) => {
                tracing::warn!(job_id = %job.id(), error = %e, "merge failed");
                job.fail(e.to_string())
            },
            Err(panic) => {
                let e = CombineError::Failed {
                    message: format!("combiner panicked: {}", panic_message(panic.as_ref())),
                };
                tracing::error!(job_id = %job.id(), error = %e, "merge panicked");
                job.fail(e.to_string())
            },
        };
        if let Err(e) = recorded {
            tracing::error!(job_id = %job.id(), error = %e, "cannot record merge outcome");
        }
    }
}

impl Dispatch for JobOrchestrator {
    fn dispatch(&self, job: JobSlot) {
        tracing::debug!(job_id = %job.id(), "dispatching merge");
        tokio::spawn(self.clone().run(job));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobRegistry;
    use crate::store::MemoryStore;
    use crate::types::job::{ChunkHandle, JobId, JobStatus, OutputHandle};
    use async_trait::async_trait;
    use bytes::Bytes;

    struct Echo;

    #[async_trait]
    impl Combiner for Echo {
        async fn combine(
            &self,
            job_id: &JobId,
            chunks: &[ChunkHandle],
        ) -> Result<OutputHandle, CombineError> {
            Ok(OutputHandle::new(format!("{job_id}:{}", chunks.len())))
        }
    }

    struct Panics;

    #[async_trait]
    impl Combiner for Panics {
        async fn combine(&self, _: &JobId, _: &[ChunkHandle]) -> Result<OutputHandle, CombineError> {
            panic!("decoder exploded");
        }
    }

    fn registry(combiner: Arc<dyn Combiner>) -> JobRegistry {
        let orchestrator = Arc::new(JobOrchestrator::new(combiner, 2));
        JobRegistry::new(Arc::new(MemoryStore::new()), orchestrator)
    }

    #[tokio::test]
    async fn successful_merge_completes_the_job() {
        let registry = registry(Arc::new(Echo));
        let id = registry.create_job(3).unwrap();
        for _ in 0..3 {
            registry.add_chunk(&id, Bytes::from_static(b"x")).await.unwrap();
        }

        let snapshot = registry.wait_for_terminal(&id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(
            registry.get_output(&id).unwrap(),
            OutputHandle::new(format!("{id}:3"))
        );
    }

    #[tokio::test]
    async fn panicking_combiner_fails_only_its_job() {
        let registry = registry(Arc::new(Panics));
        let id = registry.create_job(1).unwrap();
        registry.add_chunk(&id, Bytes::from_static(b"x")).await.unwrap();

        let snapshot = registry.wait_for_terminal(&id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Failed);
        let error = snapshot.error.unwrap();
        assert!(error.contains("decoder exploded"), "{error}");
    }

    #[test]
    fn zero_limit_still_allows_one_merge() {
        let orchestrator = JobOrchestrator::new(Arc::new(Echo), 0);
        assert_eq!(orchestrator.permits.available_permits(), 1);
        assert_eq!(orchestrator.active(), 0);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
