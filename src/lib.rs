//! Chunked media intake with exactly-once background merging.
//!
//! A client creates a job declaring how many chunks it will upload, sends
//! the chunks one request at a time, and polls until the job is complete.
//! When the last expected chunk arrives, the job is handed to a background
//! worker that combines the chunks, in arrival order, into one output.
//!
//! # Overview
//!
//! A job moves through a strictly forward state machine:
//!
//! ```text
//! waiting -> processing -> merging -> completed
//!                                  \-> failed
//! ```
//!
//! Chunk intake is linearizable per job. However many uploads race for
//! the last slot, exactly one of them dispatches the merge.
//!
//! # Module Organization
//!
//! - [`types`] - Job IDs, statuses, handles, and snapshots
//! - [`error`] - Error taxonomy with caller-facing [`ErrorKind`]s
//! - [`registry`] - Job creation, chunk intake, and status queries
//! - [`orchestrator`] - Bounded background combination
//! - [`store`] - Chunk and output persistence
//! - [`combine`] - Chunk combiners (ffmpeg, byte concatenation)
//! - [`config`] - TOML configuration with environment overrides
//! - [`observer`] - Lifecycle hooks
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use reelmerge::combine::ConcatCombiner;
//! use reelmerge::store::FsStore;
//! use reelmerge::{JobOrchestrator, JobRegistry, JobStatus};
//!
//! # tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap().block_on(async {
//! let dir = tempfile::tempdir().unwrap();
//! let store = Arc::new(FsStore::new(dir.path().join("in"), dir.path().join("out"), "bin"));
//! store.prepare().await.unwrap();
//!
//! let combiner = Arc::new(ConcatCombiner::new(Arc::clone(&store)));
//! let orchestrator = Arc::new(JobOrchestrator::new(combiner, 2));
//! let registry = JobRegistry::new(store.clone(), orchestrator);
//!
//! let id = registry.create_job(2).unwrap();
//! registry.add_chunk(&id, Bytes::from_static(b"hello ")).await.unwrap();
//! registry.add_chunk(&id, Bytes::from_static(b"world")).await.unwrap();
//!
//! let done = registry.wait_for_terminal(&id).await.unwrap();
//! assert_eq!(done.status, JobStatus::Completed);
//!
//! let output = registry.get_output(&id).unwrap();
//! let merged = std::fs::read(store.output_path(&output).unwrap()).unwrap();
//! assert_eq!(merged, b"hello world");
//! # });
//! ```

pub mod combine;
pub mod config;
pub mod constants;
pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod types;

#[cfg(feature = "logging")]
pub mod logging;

pub(crate) mod domain;

pub use error::{CombineError, ErrorKind, JobError, Result, StorageError};
pub use observer::{JobObserver, NoopObserver, TracingObserver};
pub use orchestrator::JobOrchestrator;
pub use registry::{Dispatch, JobRegistry, JobSlot};
pub use types::*;
