//! Chunk and output storage contracts and their implementations.
//!
//! # Architecture
//!
//! The registry only ever talks to two traits:
//!
//! 1. **[`ChunkStore`]**: persists one uploaded chunk and returns an
//!    opaque [`ChunkHandle`] the combiner can later resolve.
//! 2. **[`OutputStore`]**: opens a combined artifact for delivery given
//!    its [`OutputHandle`].
//!
//! # Implementations
//!
//! - [`FsStore`](fs::FsStore): files under an upload and an output
//!   directory. Implements both traits and is what the combiners read.
//! - [`MemoryStore`](memory::MemoryStore): `DashMap`-backed, for tests
//!   and embedding.

pub mod fs;
pub mod memory;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::StorageError;
use crate::types::job::{ChunkHandle, JobId, OutputHandle};

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Durable storage for uploaded chunks.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the registry calls `persist`
/// concurrently for different jobs and for different uploads to one job.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persists one chunk.
    ///
    /// `sequence` is unique per job and increases with each started
    /// upload, so `(job_id, sequence)` never collides even when an
    /// earlier upload failed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the chunk could not be written. The
    /// registry then aborts the upload without advancing the job.
    async fn persist(
        &self,
        job_id: &JobId,
        sequence: u32,
        data: Bytes,
    ) -> Result<ChunkHandle, StorageError>;
}

/// Read access to combined artifacts.
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Opens the artifact behind `handle` for streaming.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the artifact is gone, or
    /// another [`StorageError`] if it cannot be opened.
    async fn retrieve(&self, handle: &OutputHandle) -> Result<Artifact, StorageError>;
}

/// A combined artifact ready to be streamed to a client.
pub struct Artifact {
    /// Suggested download file name.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Artifact contents.
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
