//! Types for remote job operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::JobInput;

/// Errors returned by remote client calls.
///
/// These describe the call itself, not the job: a failed `status` call
/// says nothing about whether the job failed.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No job ID returned from remote service")]
    MissingJobId,

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else if e.is_connect() {
            RemoteError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Http(e.to_string())
        }
    }
}

/// Job state as reported by the remote service.
///
/// Parsed from the raw status string; unknown values are kept verbatim in
/// `Other` so the raw string is never lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    Terminated,
    Other(String),
}

impl RemoteState {
    /// Raw wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            RemoteState::Queued => "IN_QUEUE",
            RemoteState::Running => "IN_PROGRESS",
            RemoteState::Completed => "COMPLETED",
            RemoteState::Failed => "FAILED",
            RemoteState::Cancelled => "CANCELLED",
            RemoteState::TimedOut => "TIMED_OUT",
            RemoteState::Terminated => "TERMINATED",
            RemoteState::Other(raw) => raw,
        }
    }

    /// Whether the remote service will not move this job any further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteState::Completed
                | RemoteState::Failed
                | RemoteState::Cancelled
                | RemoteState::TimedOut
                | RemoteState::Terminated
        )
    }
}

impl From<String> for RemoteState {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "IN_QUEUE" | "QUEUED" => RemoteState::Queued,
            "IN_PROGRESS" | "RUNNING" => RemoteState::Running,
            "COMPLETED" => RemoteState::Completed,
            "FAILED" => RemoteState::Failed,
            "CANCELLED" => RemoteState::Cancelled,
            "TIMED_OUT" => RemoteState::TimedOut,
            "TERMINATED" => RemoteState::Terminated,
            _ => RemoteState::Other(raw),
        }
    }
}

impl From<&str> for RemoteState {
    fn from(raw: &str) -> Self {
        RemoteState::from(raw.to_string())
    }
}

impl From<RemoteState> for String {
    fn from(state: RemoteState) -> Self {
        state.as_str().to_string()
    }
}

/// Output of a job, one result per submitted text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Base64-encoded audio per item, in submission order. Entries are kept
    /// as raw JSON so one malformed entry cannot spoil its siblings.
    #[serde(default, rename = "audio", alias = "results")]
    pub results: Vec<serde_json::Value>,
    /// Audio container of the results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Application-level error reported by the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Application-level error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl JobOutput {
    /// Error embedded in a nominally successful response, if any.
    pub fn application_error(&self) -> Option<String> {
        self.error.as_ref().map(|message| match self.code {
            Some(ref code) => format!("[{}] {}", code, message),
            None => message.clone(),
        })
    }
}

/// Response of a status call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub id: String,
    pub status: RemoteState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    pub fn new(id: impl Into<String>, status: RemoteState) -> Self {
        Self {
            id: id.into(),
            status,
            output: None,
            error: None,
        }
    }

    pub fn with_output(mut self, output: JobOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Trait for remote job services.
///
/// Every method may fail; callers must treat the service as unreliable.
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Submit a job and return its id.
    async fn submit(&self, input: &JobInput) -> Result<String, RemoteError>;

    /// Fetch the current status of a job.
    async fn status(&self, job_id: &str) -> Result<JobStatus, RemoteError>;

    /// Ask the service to cancel a job. Best effort.
    async fn cancel(&self, job_id: &str) -> Result<(), RemoteError>;
}
