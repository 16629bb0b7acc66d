//! Filesystem-backed chunk and output store.
//!
//! Layout:
//!
//! ```text
//! <upload_dir>/<job_id>_<sequence>.<ext>   one file per chunk
//! <output_dir>/<job_id>.<ext>              one file per completed job
//! ```
//!
//! Chunks are written to a `.part` file first and renamed into place, so
//! a handle never points at a half-written chunk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::types::job::{ChunkHandle, JobId, OutputHandle};

use super::{Artifact, ChunkStore, OutputStore};

/// Chunk and output store rooted at two directories.
#[derive(Debug, Clone)]
pub struct FsStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    extension: String,
}

impl FsStore {
    /// Creates a store. Directories are created by [`prepare`](Self::prepare).
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            extension: extension.into(),
        }
    }

    /// Creates a store from the `[storage]` configuration section.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            config.upload_dir.clone(),
            config.output_dir.clone(),
            config.chunk_extension.clone(),
        )
    }

    /// Creates the upload and output directories if missing.
    pub async fn prepare(&self) -> Result<(), StorageError> {
        for dir in [&self.upload_dir, &self.output_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        }
        Ok(())
    }

    /// File extension used for chunks and outputs.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolves a chunk handle to its file path.
    pub fn chunk_path(&self, handle: &ChunkHandle) -> Result<PathBuf, StorageError> {
        resolve(&self.upload_dir, handle.key())
    }

    /// Resolves an output handle to its file path.
    pub fn output_path(&self, handle: &OutputHandle) -> Result<PathBuf, StorageError> {
        resolve(&self.output_dir, handle.key())
    }

    /// The handle a job's output is written under.
    pub fn output_handle(&self, job_id: &JobId) -> OutputHandle {
        OutputHandle::new(format!("{job_id}.{}", self.extension))
    }
}

/// Joins `key` onto `dir`, refusing keys that would escape it.
fn resolve(dir: &Path, key: &str) -> Result<PathBuf, StorageError> {
    let plain = !key.is_empty()
        && !key.contains(['/', '\\'])
        && key != "."
        && key != "..";
    if !plain {
        return Err(StorageError::NotFound {
            key: key.to_string(),
        });
    }
    Ok(dir.join(key))
}

#[async_trait]
impl ChunkStore for FsStore {
    async fn persist(
        &self,
        job_id: &JobId,
        sequence: u32,
        data: Bytes,
    ) -> Result<ChunkHandle, StorageError> {
        let handle = ChunkHandle::new(format!("{job_id}_{sequence}.{}", self.extension));
        let path = self.chunk_path(&handle)?;
        let partial = path.with_extension(format!("{}.part", self.extension));

        if let Err(e) = fs::write(&partial, &data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::io(partial.display().to_string(), e));
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StorageError::io(path.display().to_string(), e));
        }

        tracing::debug!(
            job_id = %job_id,
            sequence,
            bytes = data.len(),
            path = %path.display(),
            "chunk persisted"
        );
        Ok(handle)
    }
}

#[async_trait]
impl OutputStore for FsStore {
    async fn retrieve(&self, handle: &OutputHandle) -> Result<Artifact, StorageError> {
        let path = self.output_path(handle)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    key: handle.key().to_string(),
                })
            },
            Err(e) => return Err(StorageError::io(path.display().to_string(), e)),
        };
        let size = file
            .metadata()
            .await
            .map_err(|e| StorageError::io(path.display().to_string(), e))?
            .len();

        Ok(Artifact {
            file_name: handle.key().to_string(),
            size,
            reader: Box::pin(file),
        })
    }
}
