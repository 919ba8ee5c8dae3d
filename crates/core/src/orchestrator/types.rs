//! Types for the batch orchestrator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::{JobOutput, RemoteError};

/// Errors that abort an orchestration call before any work starts.
///
/// Item failures are never reported through this type; they end up on the
/// tracked items instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid orchestration options: {0}")]
    InvalidOptions(String),
}

/// Why a job or an item did not complete.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The submit call itself failed; no job exists.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The worker embedded an error in its output.
    #[error("job {job_id} returned an error: {message}")]
    Application { job_id: String, message: String },

    /// The remote service reported the job as failed.
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// The job exceeded its wall-clock limit.
    #[error("job {job_id} timed out after {}s", after.as_secs())]
    Timeout { job_id: String, after: Duration },

    /// The job was cancelled, remotely or on request.
    #[error("job {job_id} was cancelled")]
    Cancelled { job_id: String },

    /// Cancellation was requested before the item's batch was submitted.
    #[error("cancelled before submission")]
    LocalCancelled,

    /// The job completed but this item's result is unusable.
    #[error("invalid result for item {index}: {reason}")]
    InvalidResult { index: usize, reason: String },
}

impl From<RemoteError> for JobError {
    fn from(e: RemoteError) -> Self {
        JobError::Submission(e.to_string())
    }
}

/// How a polled job resolved.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// Remote COMPLETED without an embedded error.
    Completed(Option<JobOutput>),
    Failed(JobError),
    Cancelled,
    TimedOut(JobError),
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed(_) => "completed",
            JobOutcome::Failed(_) => "failed",
            JobOutcome::Cancelled => "cancelled",
            JobOutcome::TimedOut(_) => "timed_out",
        }
    }
}

/// Lifecycle state of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Submitted,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    LocalCancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Submitted => "submitted",
            ItemStatus::Queued => "queued",
            ItemStatus::Running => "running",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
            ItemStatus::Cancelled => "cancelled",
            ItemStatus::TimedOut => "timed_out",
            ItemStatus::LocalCancelled => "local_cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Completed
                | ItemStatus::Failed
                | ItemStatus::Cancelled
                | ItemStatus::TimedOut
                | ItemStatus::LocalCancelled
        )
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    ///
    /// Terminal states are final. `Queued` and `Running` may alternate while
    /// the remote service reports them; nothing goes back to `Pending`.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            ItemStatus::Pending => false,
            ItemStatus::Submitted => *self == ItemStatus::Pending,
            ItemStatus::Queued | ItemStatus::Running => *self != ItemStatus::Pending,
            ItemStatus::Completed | ItemStatus::Cancelled | ItemStatus::TimedOut => {
                *self != ItemStatus::Pending
            }
            ItemStatus::Failed | ItemStatus::LocalCancelled => true,
        }
    }

    /// Item status for a raw remote status report, if it maps to one.
    pub fn from_remote_progress(raw: &crate::remote::RemoteState) -> Option<ItemStatus> {
        match raw {
            crate::remote::RemoteState::Queued => Some(ItemStatus::Queued),
            crate::remote::RemoteState::Running => Some(ItemStatus::Running),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator-side view of one work item.
#[derive(Debug, Clone)]
pub struct TrackedItem<T> {
    /// Position of the item in the caller's input.
    pub index: usize,
    pub label: String,
    pub text: String,
    /// Caller context, handed back untouched.
    pub context: T,
    pub status: ItemStatus,
    /// Decoded audio, present only once completed.
    pub audio: Option<Vec<u8>>,
    /// Audio container of `audio`.
    pub format: String,
    /// Failure or cancellation reason.
    pub error: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<u64>,
    /// Zero-based index of the item's batch.
    pub batch_index: usize,
    /// Number of batches in this orchestration.
    pub batch_total: usize,
    /// Last raw status string reported by the remote service.
    pub remote_status: Option<String>,
    pub job_id: Option<String>,
}

impl<T> TrackedItem<T> {
    /// Record the completion timestamp and elapsed time.
    pub(crate) fn mark_completed(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.elapsed_ms = self
            .submitted_at
            .map(|submitted| (now - submitted).num_milliseconds().max(0) as u64);
    }
}

/// A submitted job, owned by the task that polls it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJob {
    pub job_id: String,
    pub batch_index: usize,
    pub item_indices: Vec<usize>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteState;

    #[test]
    fn test_terminal_statuses() {
        assert!(!ItemStatus::Pending.is_terminal());
        assert!(!ItemStatus::Submitted.is_terminal());
        assert!(!ItemStatus::Queued.is_terminal());
        assert!(!ItemStatus::Running.is_terminal());
        assert!(ItemStatus::Completed.is_terminal());
        assert!(ItemStatus::Failed.is_terminal());
        assert!(ItemStatus::Cancelled.is_terminal());
        assert!(ItemStatus::TimedOut.is_terminal());
        assert!(ItemStatus::LocalCancelled.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [
            ItemStatus::Completed,
            ItemStatus::Failed,
            ItemStatus::Cancelled,
            ItemStatus::TimedOut,
            ItemStatus::LocalCancelled,
        ] {
            assert!(!terminal.can_transition_to(ItemStatus::Running));
            assert!(!terminal.can_transition_to(ItemStatus::Failed));
            assert!(!terminal.can_transition_to(ItemStatus::Completed));
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(ItemStatus::Pending.can_transition_to(ItemStatus::Submitted));
        assert!(ItemStatus::Pending.can_transition_to(ItemStatus::LocalCancelled));
        assert!(ItemStatus::Pending.can_transition_to(ItemStatus::Failed));
        assert!(!ItemStatus::Pending.can_transition_to(ItemStatus::Running));
        assert!(!ItemStatus::Pending.can_transition_to(ItemStatus::Completed));

        assert!(ItemStatus::Submitted.can_transition_to(ItemStatus::Queued));
        assert!(ItemStatus::Queued.can_transition_to(ItemStatus::Running));
        assert!(ItemStatus::Running.can_transition_to(ItemStatus::Queued));
        assert!(ItemStatus::Running.can_transition_to(ItemStatus::Completed));
        assert!(!ItemStatus::Running.can_transition_to(ItemStatus::Submitted));
        assert!(!ItemStatus::Queued.can_transition_to(ItemStatus::Pending));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ItemStatus::LocalCancelled).unwrap();
        assert_eq!(json, "\"local_cancelled\"");
        let parsed: ItemStatus = serde_json::from_str("\"timed_out\"").unwrap();
        assert_eq!(parsed, ItemStatus::TimedOut);
        assert_eq!(ItemStatus::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn test_from_remote_progress() {
        assert_eq!(
            ItemStatus::from_remote_progress(&RemoteState::Queued),
            Some(ItemStatus::Queued)
        );
        assert_eq!(
            ItemStatus::from_remote_progress(&RemoteState::Running),
            Some(ItemStatus::Running)
        );
        assert_eq!(ItemStatus::from_remote_progress(&RemoteState::Completed), None);
        assert_eq!(
            ItemStatus::from_remote_progress(&RemoteState::Other("WARMING".into())),
            None
        );
    }

    #[test]
    fn test_job_error_display() {
        let err = JobError::Timeout {
            job_id: "job-1".to_string(),
            after: Duration::from_secs(600),
        };
        assert_eq!(err.to_string(), "job job-1 timed out after 600s");

        let err: JobError = RemoteError::MissingJobId.into();
        assert_eq!(
            err.to_string(),
            "submission failed: No job ID returned from remote service"
        );

        let err = JobError::InvalidResult {
            index: 2,
            reason: "missing audio".to_string(),
        };
        assert_eq!(err.to_string(), "invalid result for item 2: missing audio");
    }

    #[test]
    fn test_remote_job_serialization() {
        let job = RemoteJob {
            job_id: "job-123".to_string(),
            batch_index: 1,
            item_indices: vec![3, 4],
            submitted_at: Utc::now(),
        };
        let json = serde_json::to_string(&job).unwrap();
        let parsed: RemoteJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.job_id, "job-123");
        assert_eq!(parsed.item_indices, vec![3, 4]);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(JobOutcome::Completed(None).as_str(), "completed");
        assert_eq!(JobOutcome::Cancelled.as_str(), "cancelled");
        assert_eq!(
            JobOutcome::Failed(JobError::LocalCancelled).as_str(),
            "failed"
        );
    }
}
