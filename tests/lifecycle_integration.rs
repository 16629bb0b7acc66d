//! End-to-end job lifecycles over the filesystem store.
//!
//! Each test wires a real [`FsStore`] in a temp directory to a
//! [`JobOrchestrator`] and drives jobs through the public registry API.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use tokio::io::AsyncReadExt;

use reelmerge::combine::{Combiner, ConcatCombiner};
use reelmerge::store::{FsStore, OutputStore};
use reelmerge::{
    ChunkHandle, CombineError, ErrorKind, JobId, JobOrchestrator, JobRegistry, JobStatus,
    OutputHandle,
};

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<FsStore>,
    registry: JobRegistry,
}

async fn harness(combiner: Option<Arc<dyn Combiner>>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::new(
        dir.path().join("uploads"),
        dir.path().join("outputs"),
        "ts",
    ));
    store.prepare().await.unwrap();

    let combiner =
        combiner.unwrap_or_else(|| Arc::new(ConcatCombiner::new(Arc::clone(&store))));
    let orchestrator = Arc::new(JobOrchestrator::new(combiner, 2));
    let registry = JobRegistry::new(store.clone(), orchestrator);
    Harness {
        _dir: dir,
        store,
        registry,
    }
}

struct AlwaysFails;

#[async_trait]
impl Combiner for AlwaysFails {
    async fn combine(&self, _: &JobId, _: &[ChunkHandle]) -> Result<OutputHandle, CombineError> {
        Err(CombineError::Incompatible {
            message: "stream 1 uses a different codec".to_string(),
        })
    }
}

async fn read_output(store: &FsStore, handle: &OutputHandle) -> Vec<u8> {
    let mut artifact = store.retrieve(handle).await.unwrap();
    let mut bytes = Vec::new();
    artifact.reader.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(artifact.size, bytes.len() as u64);
    bytes
}

// ─── Happy path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_chunk_job_completes_in_arrival_order() {
    let h = harness(None).await;
    let id = h.registry.create_job(3).unwrap();

    for part in ["one,", "two,"] {
        h.registry
            .add_chunk(&id, Bytes::from(part.to_string()))
            .await
            .unwrap();
    }
    let snapshot = h.registry.get_status(&id).unwrap();
    assert_eq!(snapshot.status, JobStatus::Waiting);
    assert_eq!((snapshot.received, snapshot.total), (2, 3));
    assert_eq!(
        h.registry.get_output(&id).unwrap_err().kind(),
        ErrorKind::NotReady
    );

    let receipt = h
        .registry
        .add_chunk(&id, Bytes::from_static(b"three"))
        .await
        .unwrap();
    assert_eq!((receipt.received, receipt.total), (3, 3));

    let done = h.registry.wait_for_terminal(&id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error.is_none());

    let output = h.registry.get_output(&id).unwrap();
    assert_eq!(output.key(), format!("{id}.ts"));
    assert_eq!(read_output(&h.store, &output).await, b"one,two,three");
}

// ─── Failure paths ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_combiner_marks_the_job_failed() {
    let h = harness(Some(Arc::new(AlwaysFails))).await;
    let id = h.registry.create_job(1).unwrap();
    h.registry
        .add_chunk(&id, Bytes::from_static(b"clip"))
        .await
        .unwrap();

    let done = h.registry.wait_for_terminal(&id).await.unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    let error = done.error.unwrap();
    assert!(error.contains("different codec"), "{error}");

    for _ in 0..3 {
        assert_eq!(
            h.registry.get_output(&id).unwrap_err().kind(),
            ErrorKind::NotReady
        );
    }
    let err = h
        .registry
        .add_chunk(&id, Bytes::from_static(b"late"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let h = harness(None).await;
    let err = h
        .registry
        .add_chunk(&JobId::new(), Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.is_client_error());
}

#[tokio::test]
async fn retried_final_upload_is_rejected() {
    let h = harness(None).await;
    let id = h.registry.create_job(2).unwrap();
    h.registry.add_chunk(&id, Bytes::from_static(b"a")).await.unwrap();
    h.registry.add_chunk(&id, Bytes::from_static(b"b")).await.unwrap();

    let err = h
        .registry
        .add_chunk(&id, Bytes::from_static(b"b"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let done = h.registry.wait_for_terminal(&id).await.unwrap();
    assert_eq!(done.received, 2);
    let output = h.registry.get_output(&id).unwrap();
    assert_eq!(read_output(&h.store, &output).await, b"ab");
}

/// Fails any job whose first chunk starts with `bad`, concatenates the rest.
struct RejectsBadInput(ConcatCombiner, Arc<FsStore>);

#[async_trait]
impl Combiner for RejectsBadInput {
    async fn combine(
        &self,
        job_id: &JobId,
        chunks: &[ChunkHandle],
    ) -> Result<OutputHandle, CombineError> {
        let first = self.1.chunk_path(&chunks[0])?;
        let head = tokio::fs::read(&first).await.unwrap();
        if head.starts_with(b"bad") {
            return Err(CombineError::Failed {
                message: "corrupt header".to_string(),
            });
        }
        self.0.combine(job_id, chunks).await
    }
}

#[tokio::test]
async fn one_failure_does_not_affect_other_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::new(dir.path().join("u"), dir.path().join("o"), "ts"));
    store.prepare().await.unwrap();
    let registry = JobRegistry::new(
        store.clone(),
        Arc::new(JobOrchestrator::new(
            Arc::new(RejectsBadInput(
                ConcatCombiner::new(Arc::clone(&store)),
                Arc::clone(&store),
            )),
            2,
        )),
    );

    let doomed = registry.create_job(1).unwrap();
    let healthy = registry.create_job(2).unwrap();
    registry.add_chunk(&healthy, Bytes::from_static(b"good ")).await.unwrap();
    registry.add_chunk(&doomed, Bytes::from_static(b"bad data")).await.unwrap();
    registry.add_chunk(&healthy, Bytes::from_static(b"data")).await.unwrap();

    let failed = registry.wait_for_terminal(&doomed).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("corrupt header"));

    let completed = registry.wait_for_terminal(&healthy).await.unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    let output = registry.get_output(&healthy).unwrap();
    assert_eq!(read_output(&store, &output).await, b"good data");
}
