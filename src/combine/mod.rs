//! The combination step: turning an ordered list of chunks into one output.
//!
//! The orchestrator only sees the [`Combiner`] trait. Two implementations
//! work on top of [`FsStore`]:
//!
//! - [`FfmpegCombiner`]: stream-copies the chunks through ffmpeg's
//!   concat demuxer. Suitable for ordinary MP4 clips.
//! - [`ConcatCombiner`]: appends the chunk bytes. Only correct for
//!   containers that concatenate cleanly, such as MPEG-TS.

pub mod concat;
pub mod ffmpeg;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CombinerKind, MergeConfig};
use crate::error::CombineError;
use crate::store::FsStore;
use crate::types::job::{ChunkHandle, JobId, OutputHandle};

pub use concat::ConcatCombiner;
pub use ffmpeg::FfmpegCombiner;

/// Merges a job's chunks, in order, into one output artifact.
///
/// Implementations must not share mutable state between calls: the
/// orchestrator runs several combinations at once and a failure in one
/// must not affect another.
#[async_trait]
pub trait Combiner: Send + Sync {
    /// Combines `chunks` (arrival order) into the output for `job_id`.
    ///
    /// # Errors
    ///
    /// - [`CombineError::EmptyInput`] if `chunks` is empty.
    /// - [`CombineError::Incompatible`] / [`CombineError::Failed`] if the
    ///   inputs cannot be merged.
    /// - [`CombineError::Storage`] if reading chunks or writing the output
    ///   fails.
    async fn combine(
        &self,
        job_id: &JobId,
        chunks: &[ChunkHandle],
    ) -> Result<OutputHandle, CombineError>;
}

/// Builds the combiner selected by `[merge] combiner`.
pub fn from_config(config: &MergeConfig, store: Arc<FsStore>) -> Arc<dyn Combiner> {
    match config.combiner {
        CombinerKind::Ffmpeg => Arc::new(FfmpegCombiner::new(store, &config.ffmpeg_path)),
        CombinerKind::Concat => Arc::new(ConcatCombiner::new(store)),
    }
}
