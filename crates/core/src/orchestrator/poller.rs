//! Polls one remote job until it resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::remote::{JobStatus, RemoteJobClient, RemoteState};

use super::config::OrchestratorConfig;
use super::types::{JobError, JobOutcome};

/// Drives the status loop of a single job.
#[derive(Clone)]
pub struct JobPoller {
    client: Arc<dyn RemoteJobClient>,
    poll_interval: Duration,
    job_timeout: Duration,
    warn_threshold: u32,
}

impl JobPoller {
    pub fn new(client: Arc<dyn RemoteJobClient>, config: &OrchestratorConfig) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval(),
            job_timeout: config.job_timeout(),
            warn_threshold: config.status_failure_warn_threshold,
        }
    }

    /// Poll `job_id` until it resolves, times out or `cancel` fires.
    ///
    /// `on_status` is called with every status the service reports,
    /// including the final one. Failed status calls are retried on the next
    /// tick and never resolve the job by themselves.
    pub async fn poll<F, Fut>(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
        mut on_status: F,
    ) -> JobOutcome
    where
        F: FnMut(RemoteState) -> Fut,
        Fut: Future<Output = ()>,
    {
        let deadline = sleep_until(Instant::now() + self.job_timeout);
        tokio::pin!(deadline);
        let mut failures: u32 = 0;

        loop {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.abort(job_id).await,
                _ = &mut deadline => return self.time_out(job_id).await,
                response = self.client.status(job_id) => response,
            };

            match response {
                Ok(status) => {
                    failures = 0;
                    debug!("Job {} status: {}", job_id, status.status.as_str());
                    on_status(status.status.clone()).await;
                    if let Some(outcome) = resolve(job_id, status) {
                        return outcome;
                    }
                }
                Err(e) => {
                    failures += 1;
                    metrics::STATUS_CHECK_FAILURES.inc();
                    if failures >= self.warn_threshold {
                        warn!(
                            "Status check for job {} failed {} times in a row: {}",
                            job_id, failures, e
                        );
                    } else {
                        debug!("Status check for job {} failed: {}", job_id, e);
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.abort(job_id).await,
                _ = &mut deadline => return self.time_out(job_id).await,
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    async fn abort(&self, job_id: &str) -> JobOutcome {
        info!("Cancelling job {}", job_id);
        self.cancel_remote(job_id).await;
        JobOutcome::Cancelled
    }

    async fn time_out(&self, job_id: &str) -> JobOutcome {
        warn!(
            "Job {} timed out after {}s, cancelling",
            job_id,
            self.job_timeout.as_secs()
        );
        self.cancel_remote(job_id).await;
        JobOutcome::TimedOut(JobError::Timeout {
            job_id: job_id.to_string(),
            after: self.job_timeout,
        })
    }

    async fn cancel_remote(&self, job_id: &str) {
        match self.client.cancel(job_id).await {
            Ok(()) => {
                metrics::REMOTE_CANCELS.with_label_values(&["success"]).inc();
            }
            Err(e) => {
                metrics::REMOTE_CANCELS.with_label_values(&["failed"]).inc();
                warn!("Failed to cancel job {}: {}", job_id, e);
            }
        }
    }
}

/// Map a status response to an outcome, or `None` to keep polling.
///
/// An error embedded in the output wins over the status field.
fn resolve(job_id: &str, status: JobStatus) -> Option<JobOutcome> {
    if let Some(message) = status.output.as_ref().and_then(|o| o.application_error()) {
        return Some(JobOutcome::Failed(JobError::Application {
            job_id: job_id.to_string(),
            message,
        }));
    }
    if !status.status.is_terminal() {
        return None;
    }

    match status.status {
        RemoteState::Completed => Some(JobOutcome::Completed(status.output)),
        RemoteState::Failed => Some(JobOutcome::Failed(JobError::JobFailed {
            job_id: job_id.to_string(),
            message: status
                .error
                .unwrap_or_else(|| "job failed without an error message".to_string()),
        })),
        RemoteState::Cancelled | RemoteState::Terminated => Some(JobOutcome::Cancelled),
        RemoteState::TimedOut => Some(JobOutcome::TimedOut(JobError::JobFailed {
            job_id: job_id.to_string(),
            message: status
                .error
                .unwrap_or_else(|| "timed out on the remote service".to_string()),
        })),
        RemoteState::Queued | RemoteState::Running | RemoteState::Other(_) => None,
    }
}
