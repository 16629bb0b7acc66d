//! In-memory chunk and output store.
//!
//! [`MemoryStore`] keeps chunk and output bytes in two `DashMap`s keyed by
//! handle key. Chunk keys have the form `{job_id}/{sequence}`, output keys
//! `{job_id}`.
//!
//! # Examples
//!
//! ```
//! use bytes::Bytes;
//! use reelmerge::store::{ChunkStore, MemoryStore};
//! use reelmerge::JobId;
//!
//! # tokio_test_block_on(async {
//! let store = MemoryStore::new();
//! let job = JobId::new();
//! let handle = store.persist(&job, 0, Bytes::from_static(b"clip")).await.unwrap();
//! assert_eq!(store.chunk(&handle).unwrap(), Bytes::from_static(b"clip"));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::StorageError;
use crate::types::job::{ChunkHandle, JobId, OutputHandle};

use super::{Artifact, ChunkStore, OutputStore};

/// Thread-safe in-memory store for chunks and outputs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chunks: DashMap<String, Bytes>,
    outputs: DashMap<String, Bytes>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bytes of a persisted chunk.
    pub fn chunk(&self, handle: &ChunkHandle) -> Option<Bytes> {
        self.chunks.get(handle.key()).map(|entry| entry.value().clone())
    }

    /// Stores a combined output for `job_id`, replacing any previous one.
    pub fn put_output(&self, job_id: &JobId, data: Bytes) -> OutputHandle {
        let key = job_id.to_string();
        self.outputs.insert(key.clone(), data);
        OutputHandle::new(key)
    }

    /// Number of persisted chunks across all jobs.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn persist(
        &self,
        job_id: &JobId,
        sequence: u32,
        data: Bytes,
    ) -> Result<ChunkHandle, StorageError> {
        let key = format!("{job_id}/{sequence}");
        self.chunks.insert(key.clone(), data);
        Ok(ChunkHandle::new(key))
    }
}

#[async_trait]
impl OutputStore for MemoryStore {
    async fn retrieve(&self, handle: &OutputHandle) -> Result<Artifact, StorageError> {
        let data = self
            .outputs
            .get(handle.key())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound {
                key: handle.key().to_string(),
            })?;
        Ok(Artifact {
            file_name: handle.key().to_string(),
            size: data.len() as u64,
            reader: Box::pin(Cursor::new(data)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn persist_keys_by_job_and_sequence() {
        let store = MemoryStore::new();
        let job = JobId::new();
        let a = store.persist(&job, 0, Bytes::from_static(b"a")).await.unwrap();
        let b = store.persist(&job, 1, Bytes::from_static(b"b")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.chunk_count(), 2);
        assert_eq!(a.key(), format!("{job}/0"));
    }

    #[tokio::test]
    async fn retrieve_streams_output() {
        let store = MemoryStore::new();
        let job = JobId::new();
        let handle = store.put_output(&job, Bytes::from_static(b"merged"));

        let mut artifact = store.retrieve(&handle).await.unwrap();
        assert_eq!(artifact.size, 6);
        let mut buf = Vec::new();
        artifact.reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"merged");
    }

    #[tokio::test]
    async fn retrieve_unknown_output_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .retrieve(&OutputHandle::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
