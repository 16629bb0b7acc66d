//! ffmpeg concat-demuxer combiner.
//!
//! Writes a concat list next to the output and runs
//!
//! ```text
//! ffmpeg -y -hide_banner -loglevel error -f concat -safe 0 -i <list> -c copy <tmp>
//! ```
//!
//! The result is renamed into place only when ffmpeg exits successfully.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;

use crate::error::{CombineError, StorageError};
use crate::store::FsStore;
use crate::types::job::{ChunkHandle, JobId, OutputHandle};

use super::Combiner;

/// Number of stderr bytes kept in a failure message.
const STDERR_TAIL_BYTES: usize = 2048;

/// Stream-copies chunks through ffmpeg's concat demuxer.
#[derive(Debug, Clone)]
pub struct FfmpegCombiner {
    store: Arc<FsStore>,
    program: PathBuf,
}

impl FfmpegCombiner {
    /// Creates a combiner that runs `program` (usually `"ffmpeg"`).
    pub fn new(store: Arc<FsStore>, program: impl Into<PathBuf>) -> Self {
        Self {
            store,
            program: program.into(),
        }
    }

    async fn write_list(&self, list: &Path, chunks: &[ChunkHandle]) -> Result<(), CombineError> {
        let mut body = String::new();
        for chunk in chunks {
            let path = self.store.chunk_path(chunk)?;
            let path = fs::canonicalize(&path)
                .await
                .map_err(|e| StorageError::io(chunk.key(), e))?;
            body.push_str(&concat_entry(&path));
        }
        fs::write(list, body)
            .await
            .map_err(|e| StorageError::io(list.display().to_string(), e))?;
        Ok(())
    }

    async fn run(&self, list: &Path, target: &Path) -> Result<(), CombineError> {
        let output = Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(list)
            .args(["-c", "copy"])
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CombineError::Failed {
                message: format!("failed to launch {}: {e}", self.program.display()),
            })?;

        if output.status.success() {
            return Ok(());
        }
        Err(CombineError::Failed {
            message: format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr_tail(&output.stderr)
            ),
        })
    }
}

#[async_trait]
impl Combiner for FfmpegCombiner {
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
        let list = path.with_extension("concat.txt");
        // ffmpeg picks the muxer from the extension, so keep it last.
        let partial = path.with_extension(format!("part.{}", self.store.extension()));

        let result = async {
            self.write_list(&list, chunks).await?;
            self.run(&list, &partial).await?;
            fs::rename(&partial, &path)
                .await
                .map_err(|e| StorageError::io(path.display().to_string(), e))?;
            Ok::<_, CombineError>(())
        }
        .await;

        let _ = fs::remove_file(&list).await;
        if let Err(e) = result {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        tracing::debug!(job_id = %job_id, chunks = chunks.len(), "ffmpeg concat finished");
        Ok(handle)
    }
}

/// One `file '<path>'` line, with single quotes escaped for the demuxer.
fn concat_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{escaped}'\n")
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    let tail = String::from_utf8_lossy(&stderr[start..]);
    let tail = tail.trim();
    if tail.is_empty() {
        "no diagnostic output".to_string()
    } else {
        tail.to_string()
    }
}
