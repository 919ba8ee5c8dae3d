//! Mock remote job client for testing.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::batch::JobInput;
use crate::remote::{JobOutput, JobStatus, RemoteError, RemoteJobClient, RemoteState};

use super::fixtures;

/// A recorded submit call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmit {
    /// Zero-based submit call number.
    pub call: usize,
    /// Job id handed out, `None` if the call failed.
    pub job_id: Option<String>,
    /// The payload that was submitted.
    pub input: JobInput,
    /// When the call was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// One scripted response to a status call.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Report this status.
    Respond(JobStatus),
    /// Fail the status call itself.
    TransportError(String),
    /// Report COMPLETED with one valid result per submitted text.
    CompleteAll,
}

impl MockStep {
    pub fn state(state: RemoteState) -> Self {
        MockStep::Respond(JobStatus::new("", state))
    }

    pub fn queued() -> Self {
        Self::state(RemoteState::Queued)
    }

    pub fn running() -> Self {
        Self::state(RemoteState::Running)
    }

    pub fn completed(output: JobOutput) -> Self {
        MockStep::Respond(JobStatus::new("", RemoteState::Completed).with_output(output))
    }

    pub fn failed(error: impl Into<String>) -> Self {
        MockStep::Respond(JobStatus::new("", RemoteState::Failed).with_error(error))
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        MockStep::TransportError(message.into())
    }
}

/// Internal state for a submitted job.
#[derive(Debug, Clone)]
struct MockJob {
    input: JobInput,
    steps: Vec<MockStep>,
    cursor: usize,
    status_calls: usize,
}

/// Mock implementation of the RemoteJobClient trait.
///
/// Job ids are deterministic: the n-th submit call (zero-based) returns
/// `job-n`. Every status call advances the job's script by one step; the
/// last step repeats once the script is exhausted. Jobs without a script
/// report RUNNING once, then complete with one result per text whose
/// decoded audio is `fixtures::fake_audio(text)`.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockRemoteClient::new();
///
/// // Second submission fails, third job never finishes
/// client.fail_submit(1, "endpoint overloaded").await;
/// client.script(2, vec![MockStep::running()]).await;
///
/// // ...orchestrate...
///
/// assert_eq!(client.submit_count().await, 3);
/// assert_eq!(client.cancelled_jobs().await, vec!["job-2"]);
/// ```
#[derive(Debug)]
pub struct MockRemoteClient {
    /// Recorded submit calls.
    submissions: Arc<RwLock<Vec<RecordedSubmit>>>,
    /// Submitted jobs by id.
    jobs: Arc<RwLock<HashMap<String, MockJob>>>,
    /// Scripts by submit call number.
    scripts: Arc<RwLock<HashMap<usize, Vec<MockStep>>>>,
    /// Script for calls without a dedicated one.
    default_script: Arc<RwLock<Option<Vec<MockStep>>>>,
    /// Submit calls that fail, by call number.
    submit_failures: Arc<RwLock<HashMap<usize, String>>>,
    /// Tokens cancelled while a given submit call is served.
    cancel_on_submit: Arc<RwLock<HashMap<usize, CancellationToken>>>,
    /// Recorded cancel calls.
    cancelled: Arc<RwLock<Vec<String>>>,
    /// If set, cancel calls fail.
    cancel_fails: Arc<RwLock<bool>>,
}

impl Default for MockRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteClient {
    /// Create a new mock client.
    pub fn new() -> Self {
        Self {
            submissions: Arc::new(RwLock::new(Vec::new())),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            scripts: Arc::new(RwLock::new(HashMap::new())),
            default_script: Arc::new(RwLock::new(None)),
            submit_failures: Arc::new(RwLock::new(HashMap::new())),
            cancel_on_submit: Arc::new(RwLock::new(HashMap::new())),
            cancelled: Arc::new(RwLock::new(Vec::new())),
            cancel_fails: Arc::new(RwLock::new(false)),
        }
    }

    /// Script the status responses of the job created by submit call `call`.
    pub async fn script(&self, call: usize, steps: Vec<MockStep>) {
        self.scripts.write().await.insert(call, steps);
    }

    /// Script every job that has no dedicated script.
    pub async fn set_default_script(&self, steps: Vec<MockStep>) {
        *self.default_script.write().await = Some(steps);
    }

    /// Make submit call `call` fail with an API error.
    pub async fn fail_submit(&self, call: usize, message: impl Into<String>) {
        self.submit_failures
            .write()
            .await
            .insert(call, message.into());
    }

    /// Cancel `token` while submit call `call` is being served.
    pub async fn cancel_on_submit(&self, call: usize, token: CancellationToken) {
        self.cancel_on_submit.write().await.insert(call, token);
    }

    /// Make every cancel call fail.
    pub async fn fail_cancels(&self, fail: bool) {
        *self.cancel_fails.write().await = fail;
    }

    /// Get all recorded submit calls.
    pub async fn submissions(&self) -> Vec<RecordedSubmit> {
        self.submissions.read().await.clone()
    }

    /// Number of submit calls made, failed ones included.
    pub async fn submit_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    /// Job ids passed to `cancel`, in call order.
    pub async fn cancelled_jobs(&self) -> Vec<String> {
        self.cancelled.read().await.clone()
    }

    /// Number of status calls made for a job.
    pub async fn status_calls(&self, job_id: &str) -> usize {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map(|job| job.status_calls)
            .unwrap_or(0)
    }

    fn complete_all(job_id: &str, input: &JobInput) -> JobStatus {
        let results = input
            .texts
            .iter()
            .map(|text| serde_json::Value::String(STANDARD.encode(fixtures::fake_audio(text))))
            .collect();
        JobStatus::new(job_id, RemoteState::Completed).with_output(JobOutput {
            results,
            format: Some(input.params.output_format.clone()),
            error: None,
            code: None,
        })
    }
}

#[async_trait]
impl RemoteJobClient for MockRemoteClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, input: &JobInput) -> Result<String, RemoteError> {
        let mut submissions = self.submissions.write().await;
        let call = submissions.len();

        if let Some(token) = self.cancel_on_submit.read().await.get(&call) {
            token.cancel();
        }

        if let Some(message) = self.submit_failures.read().await.get(&call) {
            submissions.push(RecordedSubmit {
                call,
                job_id: None,
                input: input.clone(),
                timestamp: Utc::now(),
            });
            return Err(RemoteError::Api {
                status: 500,
                message: message.clone(),
            });
        }

        let job_id = format!("job-{}", call);
        let steps = match self.scripts.read().await.get(&call) {
            Some(steps) => steps.clone(),
            None => self
                .default_script
                .read()
                .await
                .clone()
                .unwrap_or_else(|| vec![MockStep::running(), MockStep::CompleteAll]),
        };

        self.jobs.write().await.insert(
            job_id.clone(),
            MockJob {
                input: input.clone(),
                steps,
                cursor: 0,
                status_calls: 0,
            },
        );
        submissions.push(RecordedSubmit {
            call,
            job_id: Some(job_id.clone()),
            input: input.clone(),
            timestamp: Utc::now(),
        });

        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, RemoteError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id).ok_or_else(|| RemoteError::Api {
            status: 404,
            message: format!("job {} not found", job_id),
        })?;

        job.status_calls += 1;
        let step = if job.steps.is_empty() {
            MockStep::CompleteAll
        } else {
            let step = job.steps[job.cursor.min(job.steps.len() - 1)].clone();
            job.cursor += 1;
            step
        };

        match step {
            MockStep::Respond(mut status) => {
                status.id = job_id.to_string();
                Ok(status)
            }
            MockStep::TransportError(message) => Err(RemoteError::ConnectionFailed(message)),
            MockStep::CompleteAll => Ok(Self::complete_all(job_id, &job.input)),
        }
    }

    async fn cancel(&self, job_id: &str) -> Result<(), RemoteError> {
        self.cancelled.write().await.push(job_id.to_string());
        if *self.cancel_fails.read().await {
            return Err(RemoteError::Api {
                status: 500,
                message: "cancel rejected".to_string(),
            });
        }
        Ok(())
    }
}
