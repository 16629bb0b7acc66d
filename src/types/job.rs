//! Public job types: identifiers, status, snapshots and handles.
//!
//! # Serialization
//!
//! [`JobSnapshot`] uses `camelCase` field names. [`JobStatus`] serializes
//! as `snake_case` strings (`"waiting"`, `"processing"`, ...), matching
//! what the HTTP adapter reports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Opaque, immutable job identifier (a `UUIDv4` string).
///
/// # Examples
///
/// ```
/// use reelmerge::JobId;
///
/// let id = JobId::new();
/// let parsed: JobId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// assert!("not-a-uuid".parse::<JobId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string is not a valid job ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed job id: {0}")]
pub struct ParseJobIdError(String);

impl FromStr for JobId {
    type Err = ParseJobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(|uuid| Self(uuid.hyphenated().to_string()))
            .map_err(|_| ParseJobIdError(s.to_string()))
    }
}

/// Job lifecycle status.
///
/// # State Machine
///
/// ```text
/// Waiting -> Processing -> Merging -> Completed
///                                  -> Failed
/// Completed -> (terminal, no transitions)
/// Failed    -> (terminal, no transitions)
/// ```
///
/// Only the single forward step out of each non-terminal state is valid.
/// Self-transitions and skips are rejected.
///
/// # Examples
///
/// ```
/// use reelmerge::JobStatus;
///
/// assert!(JobStatus::Waiting.can_transition_to(&JobStatus::Processing));
/// assert!(!JobStatus::Waiting.can_transition_to(&JobStatus::Merging));
/// assert!(JobStatus::Failed.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepting chunks.
    Waiting,
    /// All chunks received, combination dispatched.
    Processing,
    /// The combiner is running.
    Merging,
    /// Output is available (terminal).
    Completed,
    /// Combination failed (terminal).
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Processing => write!(f, "processing"),
            Self::Merging => write!(f, "merging"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl JobStatus {
    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the lifecycle. Observed ranks never decrease.
    ///
    /// Both terminal states share the highest rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Processing => 1,
            Self::Merging => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Returns `true` if moving from this status to `next` is valid.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Processing)
                | (Self::Processing, Self::Merging)
                | (Self::Merging, Self::Completed)
                | (Self::Merging, Self::Failed)
        )
    }

    /// Validates a transition, returning [`JobError::InvalidState`] with
    /// context when it is rejected.
    pub fn validate_transition(&self, job_id: &JobId, next: &Self) -> Result<(), JobError> {
        if self.can_transition_to(next) {
            return Ok(());
        }
        let reason = if self.is_terminal() {
            "job is in a terminal state and cannot be transitioned".to_string()
        } else if self == next {
            format!("job is already {self}")
        } else {
            format!("cannot move from {self} to {next}")
        };
        Err(JobError::invalid_state(job_id, *self, reason))
    }
}

/// Opaque reference to a persisted chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkHandle(String);

impl ChunkHandle {
    /// Wraps a store-specific key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the store-specific key.
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a combined output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputHandle(String);

impl OutputHandle {
    /// Wraps a store-specific key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the store-specific key.
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Intake progress returned by a successful chunk upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReceipt {
    /// Chunks accepted so far, including this one.
    pub received: u32,
    /// Chunks expected in total.
    pub total: u32,
}

impl ChunkReceipt {
    /// Returns `true` if this upload closed intake.
    pub fn is_last(&self) -> bool {
        self.received == self.total
    }
}

/// Point-in-time view of a job, captured under the job's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    /// The job's ID.
    pub job_id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Chunks accepted so far.
    pub received: u32,
    /// Chunks expected in total.
    pub total: u32,
    /// Failure description, set only when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Time of the last mutation (RFC 3339).
    pub updated_at: String,
}

impl JobSnapshot {
    /// Returns `true` once the job reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_id_parse_normalizes_case() {
        let id = JobId::new();
        let upper = id.to_string().to_uppercase();
        assert_eq!(upper.parse::<JobId>().unwrap(), id);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(JobStatus::Merging).unwrap(), json!("merging"));
        let parsed: JobStatus = serde_json::from_value(json!("completed")).unwrap();
        assert_eq!(parsed, JobStatus::Completed);
    }

    #[test]
    fn rank_follows_lifecycle() {
        assert!(JobStatus::Waiting.rank() < JobStatus::Processing.rank());
        assert!(JobStatus::Processing.rank() < JobStatus::Merging.rank());
        assert!(JobStatus::Merging.rank() < JobStatus::Completed.rank());
        assert_eq!(JobStatus::Completed.rank(), JobStatus::Failed.rank());
    }

    #[test]
    fn validate_transition_explains_rejections() {
        let id = JobId::new();
        let err = JobStatus::Completed
            .validate_transition(&id, &JobStatus::Failed)
            .unwrap_err();
        assert!(err.to_string().contains("terminal"));

        let err = JobStatus::Waiting
            .validate_transition(&id, &JobStatus::Waiting)
            .unwrap_err();
        assert!(err.to_string().contains("already waiting"));
    }

    #[test]
    fn snapshot_omits_missing_error() {
        let snapshot = JobSnapshot {
            job_id: JobId::new(),
            status: JobStatus::Waiting,
            received: 1,
            total: 3,
            error: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["received"], json!(1));
        assert_eq!(value["createdAt"], json!("2026-01-01T00:00:00.000Z"));
    }
}
