//! Byte-level concatenation combiner.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{CombineError, StorageError};
use crate::store::FsStore;
use crate::types::job::{ChunkHandle, JobId, OutputHandle};

use super::Combiner;

/// Appends chunk files, in order, into the job's output file.
///
/// The output is written to a temporary file and renamed into place once
/// complete, so a failed merge never leaves a partial artifact under the
/// job's output name.
#[derive(Debug, Clone)]
pub struct ConcatCombiner {
    store: Arc<FsStore>,
}

impl ConcatCombiner {
    /// Creates a combiner reading from and writing to `store`.
    pub fn new(store: Arc<FsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Combiner for ConcatCombiner {
    async fn combine(
        &self,
        job_id: &JobId,
        chunks: &[ChunkHandle],
    ) -> Result<OutputHandle, CombineError> {
        if chunks.is_empty() {
            return Err(CombineError::EmptyInput);
        }

        let handle = self.store.output_handle(job_id);
        let path = self.store.output_path(&handle)?;
        let partial = path.with_extension("part");
        let io_err = |e| StorageError::io(partial.display().to_string(), e);

        let result: Result<(), CombineError> = async {
            let file = fs::File::create(&partial).await.map_err(io_err)?;
            let mut writer = BufWriter::new(file);
            for chunk in chunks {
                let source = self.store.chunk_path(chunk)?;
                let mut reader = fs::File::open(&source)
                    .await
                    .map_err(|e| StorageError::io(chunk.key(), e))?;
                tokio::io::copy(&mut reader, &mut writer)
                    .await
                    .map_err(io_err)?;
            }
            writer.flush().await.map_err(io_err)?;
            writer.into_inner().sync_all().await.map_err(io_err)?;
            fs::rename(&partial, &path)
                .await
                .map_err(|e| StorageError::io(path.display().to_string(), e))?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        tracing::debug!(job_id = %job_id, chunks = chunks.len(), "chunks concatenated");
        Ok(handle)
    }
}
