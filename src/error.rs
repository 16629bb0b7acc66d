//! Error types for job lifecycle operations.
//!
//! [`JobError`] is the closed taxonomy surfaced to callers of the
//! registry. Collaborator failures are carried as [`StorageError`] and
//! [`CombineError`] so that the chunk store and combiner can report
//! their own context without knowing about jobs.

use thiserror::Error;

use crate::types::job::{JobId, JobStatus};

/// Convenience alias used throughout the crate.
pub type Result<T, E = JobError> = std::result::Result<T, E>;

/// Errors that can occur while creating, feeding, or reading a job.
///
/// Use [`kind`](JobError::kind) to branch on the failure class instead of
/// matching message text.
///
/// # Examples
///
/// ```
/// use reelmerge::{ErrorKind, JobError, JobId};
///
/// let err = JobError::NotFound { job_id: JobId::new() };
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert!(err.is_client_error());
/// ```
#[derive(Debug, Error)]
pub enum JobError {
    /// Creation or intake parameters were rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the input.
        message: String,
    },

    /// No job with the given ID exists.
    #[error("job not found: {job_id}")]
    NotFound {
        /// The ID that was looked up.
        job_id: JobId,
    },

    /// The operation is not valid for the job's current status.
    #[error("invalid state for job {job_id}: {reason} (status: {status})")]
    InvalidState {
        /// The affected job.
        job_id: JobId,
        /// The status observed when the operation was rejected.
        status: JobStatus,
        /// Why the operation was rejected.
        reason: String,
    },

    /// Output was requested before the job completed.
    #[error("job not completed: {job_id} (status: {status})")]
    NotReady {
        /// The affected job.
        job_id: JobId,
        /// The job's current, non-completed status.
        status: JobStatus,
    },

    /// Chunk or output persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The combiner failed to produce an output.
    #[error(transparent)]
    Combine(#[from] CombineError),
}

/// The closed set of failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad creation or intake parameters.
    InvalidArgument,
    /// Unknown job ID.
    NotFound,
    /// Operation not valid for the current job status.
    InvalidState,
    /// Output requested before completion.
    NotReady,
    /// Collaborator persistence failure.
    Storage,
    /// Collaborator combination failure.
    Combine,
}

impl JobError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(job_id: &JobId) -> Self {
        Self::NotFound {
            job_id: job_id.clone(),
        }
    }

    pub(crate) fn invalid_state(job_id: &JobId, status: JobStatus, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            job_id: job_id.clone(),
            status,
            reason: reason.into(),
        }
    }

    /// Returns the failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Combine(_) => ErrorKind::Combine,
        }
    }

    /// Returns `true` for failures caused by the caller's request rather
    /// than by a collaborator.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Combine(_))
    }
}

/// Errors raised by chunk and output stores.
///
/// # Examples
///
/// ```
/// use reelmerge::StorageError;
///
/// let err = StorageError::NotFound { key: "job_0.mp4".to_string() };
/// assert!(err.to_string().contains("job_0.mp4"));
/// ```
#[derive(Debug, Error)]
pub enum StorageError {
    /// The referenced chunk or output does not exist.
    #[error("stored object not found: {key}")]
    NotFound {
        /// The handle key that was looked up.
        key: String,
    },

    /// An I/O failure in the backing store.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        /// The handle key or path being accessed.
        key: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Any other backend failure.
    #[error("storage backend error: {message}")]
    Backend {
        /// Human-readable description.
        message: String,
    },
}

impl StorageError {
    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Errors raised by a [`Combiner`](crate::combine::Combiner).
#[derive(Debug, Error)]
pub enum CombineError {
    /// The combiner was handed no chunks.
    #[error("nothing to combine: chunk list is empty")]
    EmptyInput,

    /// The chunks cannot be joined (mismatched codecs, containers, ...).
    #[error("incompatible inputs: {message}")]
    Incompatible {
        /// Description of the incompatibility.
        message: String,
    },

    /// The combination process itself failed.
    #[error("combine failed: {message}")]
    Failed {
        /// Description of the failure, e.g. the tail of a tool's stderr.
        message: String,
    },

    /// Reading chunks or writing the output failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_every_variant() {
        let id = JobId::new();
        assert_eq!(
            JobError::invalid_argument("zero").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(JobError::not_found(&id).kind(), ErrorKind::NotFound);
        assert_eq!(
            JobError::invalid_state(&id, JobStatus::Processing, "closed").kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            JobError::NotReady {
                job_id: id.clone(),
                status: JobStatus::Merging
            }
            .kind(),
            ErrorKind::NotReady
        );
        assert_eq!(
            JobError::from(StorageError::Backend {
                message: "disk full".into()
            })
            .kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            JobError::from(CombineError::EmptyInput).kind(),
            ErrorKind::Combine
        );
    }

    #[test]
    fn collaborator_failures_are_not_client_errors() {
        assert!(!JobError::from(CombineError::EmptyInput).is_client_error());
        assert!(JobError::invalid_argument("x").is_client_error());
    }

    #[test]
    fn display_includes_context() {
        let id = JobId::new();
        let err = JobError::invalid_state(&id, JobStatus::Completed, "intake is closed");
        let text = err.to_string();
        assert!(text.contains(&id.to_string()));
        assert!(text.contains("completed"));
        assert!(text.contains("intake is closed"));
    }

    #[test]
    fn storage_io_exposes_source() {
        let err = StorageError::io(
            "a.mp4",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
