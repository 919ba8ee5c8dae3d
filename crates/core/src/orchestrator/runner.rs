//! Batch orchestrator implementation.
//!
//! Submits batches one after another, then polls every submitted job
//! concurrently (one task per job) until all of them resolve.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::{build_batches, GenerationParams, WorkItem};
use crate::metrics;
use crate::remote::{JobOutput, RemoteJobClient};

use super::config::OrchestratorConfig;
use super::observer::{ItemEvent, ObserverHandle};
use super::poller::JobPoller;
use super::tracker::ItemTracker;
use super::types::{ItemStatus, JobError, JobOutcome, OrchestratorError, RemoteJob, TrackedItem};

/// Per-call options of [`BatchOrchestrator::orchestrate`].
pub struct OrchestrateOptions<T> {
    /// Parameters every item starts from before its overrides.
    pub defaults: GenerationParams,
    /// Overrides the configured batch size.
    pub batch_size: Option<usize>,
    /// Cancels the whole call when triggered.
    pub cancel: CancellationToken,
    pub observer: Option<ObserverHandle<T>>,
}

impl<T> Default for OrchestrateOptions<T> {
    fn default() -> Self {
        Self {
            defaults: GenerationParams::default(),
            batch_size: None,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }
}

impl<T> OrchestrateOptions<T> {
    pub fn with_defaults(mut self, defaults: GenerationParams) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: ObserverHandle<T>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// Turns work items into remote jobs and tracks every item to a terminal
/// status.
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    client: Arc<dyn RemoteJobClient>,
    active_jobs: Arc<RwLock<HashMap<String, RemoteJob>>>,
}

impl BatchOrchestrator {
    pub fn new(config: OrchestratorConfig, client: Arc<dyn RemoteJobClient>) -> Self {
        Self {
            config,
            client,
            active_jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Process `items` and return one tracked item per input, in input order.
    ///
    /// Only invalid options produce an error. Every item failure is reported
    /// on its tracked item, and every returned item is terminal.
    pub async fn orchestrate<T>(
        &self,
        items: Vec<WorkItem<T>>,
        options: OrchestrateOptions<T>,
    ) -> Result<Vec<TrackedItem<T>>, OrchestratorError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let batch_size = self.validate_options(&options)?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let OrchestrateOptions {
            defaults,
            cancel,
            observer,
            ..
        } = options;

        let batches = build_batches(&items, &defaults, batch_size);
        let batch_total = batches.len();
        let mut batch_of = vec![0; items.len()];
        for batch in &batches {
            for &index in &batch.item_indices {
                batch_of[index] = batch.index;
            }
        }

        let tracked = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| TrackedItem {
                index,
                format: item.effective_params(&defaults).output_format,
                label: item.label,
                text: item.text,
                context: item.context,
                status: ItemStatus::Pending,
                audio: None,
                error: None,
                submitted_at: None,
                completed_at: None,
                elapsed_ms: None,
                batch_index: batch_of[index],
                batch_total,
                remote_status: None,
                job_id: None,
            })
            .collect();
        let tracker = ItemTracker::new(tracked);

        info!(
            "Orchestrating {} items in {} batches via {}",
            tracker.len(),
            batch_total,
            self.client.name()
        );
        let reporter = Reporter { observer, cancel };
        reporter.init(&tracker).await;
        let cancel = &reporter.cancel;

        let poller = JobPoller::new(Arc::clone(&self.client), &self.config);
        let mut tasks = JoinSet::new();

        for batch in batches {
            if cancel.is_cancelled() {
                debug!("Batch {} not submitted: cancelled", batch.index);
                let reason = JobError::LocalCancelled.to_string();
                for &index in &batch.item_indices {
                    let update = tracker
                        .transition(index, ItemStatus::LocalCancelled, |item| {
                            item.error = Some(reason.clone());
                        })
                        .await;
                    reporter.publish(update).await;
                }
                continue;
            }

            let submitted_at = Utc::now();
            let job_id = match self.client.submit(&batch.input).await {
                Ok(job_id) => job_id,
                Err(e) => {
                    metrics::JOB_SUBMIT_FAILURES.inc();
                    warn!("Failed to submit batch {}: {}", batch.index, e);
                    let reason = JobError::from(e).to_string();
                    for &index in &batch.item_indices {
                        let update = tracker
                            .transition(index, ItemStatus::Failed, |item| {
                                item.submitted_at = Some(submitted_at);
                                item.error = Some(reason.clone());
                            })
                            .await;
                        reporter.publish(update).await;
                    }
                    continue;
                }
            };

            metrics::JOBS_SUBMITTED.inc();
            info!(
                "Submitted batch {}/{} as job {} ({} items)",
                batch.index + 1,
                batch_total,
                job_id,
                batch.len()
            );

            for &index in &batch.item_indices {
                let update = tracker
                    .transition(index, ItemStatus::Submitted, |item| {
                        item.submitted_at = Some(submitted_at);
                        item.job_id = Some(job_id.clone());
                    })
                    .await;
                reporter.publish(update).await;
            }

            let job = RemoteJob {
                job_id: job_id.clone(),
                batch_index: batch.index,
                item_indices: batch.item_indices.clone(),
                submitted_at,
            };
            self.active_jobs
                .write()
                .await
                .insert(job_id.clone(), job.clone());

            reporter.batch_submitted(batch.index, job_id, batch.len());

            tasks.spawn(drive_job(
                poller.clone(),
                job,
                tracker.clone(),
                reporter.clone(),
                Arc::clone(&self.active_jobs),
            ));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Job polling task failed: {}", e);
            }
        }

        // Items of a task that died without resolving its job.
        for index in 0..tracker.len() {
            let unresolved = tracker
                .get(index)
                .await
                .is_some_and(|item| !item.status.is_terminal());
            if !unresolved {
                continue;
            }
            warn!("Item {} has no result after polling ended", index);
            let update = tracker
                .transition(index, ItemStatus::Failed, |item| {
                    item.error = Some("job polling ended without a result".to_string());
                })
                .await;
            reporter.publish(update).await;
        }

        Ok(tracker.into_items().await)
    }

    /// Job ids submitted and not yet resolved.
    pub async fn active_jobs(&self) -> Vec<String> {
        let mut job_ids: Vec<String> = self.active_jobs.read().await.keys().cloned().collect();
        job_ids.sort();
        job_ids
    }

    /// Ask the remote service to cancel every active job.
    ///
    /// Best effort: failures are logged. Returns the number of jobs for
    /// which a cancel was requested.
    pub async fn cancel_all(&self) -> usize {
        let job_ids = self.active_jobs().await;
        if job_ids.is_empty() {
            return 0;
        }

        info!("Cancelling {} active jobs", job_ids.len());
        let results = join_all(job_ids.iter().map(|job_id| self.client.cancel(job_id))).await;

        for (job_id, result) in job_ids.iter().zip(results) {
            match result {
                Ok(()) => {
                    metrics::REMOTE_CANCELS.with_label_values(&["success"]).inc();
                    debug!("Cancelled job {}", job_id);
                }
                Err(e) => {
                    metrics::REMOTE_CANCELS.with_label_values(&["failed"]).inc();
                    warn!("Failed to cancel job {}: {}", job_id, e);
                }
            }
        }
        job_ids.len()
    }

    fn validate_options<T>(&self, options: &OrchestrateOptions<T>) -> Result<usize, OrchestratorError> {
        let batch_size = options.batch_size.unwrap_or(self.config.batch_size);
        if batch_size == 0 {
            return Err(OrchestratorError::InvalidOptions(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.config.job_timeout_ms == 0 {
            return Err(OrchestratorError::InvalidOptions(
                "job_timeout_ms must be at least 1".to_string(),
            ));
        }
        if options.defaults.output_format.trim().is_empty() {
            return Err(OrchestratorError::InvalidOptions(
                "output_format cannot be empty".to_string(),
            ));
        }
        Ok(batch_size)
    }
}

/// Poll one job and apply its outcome to the items of its batch.
async fn drive_job<T>(
    poller: JobPoller,
    job: RemoteJob,
    tracker: ItemTracker<T>,
    reporter: Reporter<T>,
    active_jobs: Arc<RwLock<HashMap<String, RemoteJob>>>,
) where
    T: Clone + Send + Sync + 'static,
{
    let outcome = poller
        .poll(&job.job_id, &reporter.cancel, |state| {
            let tracker = tracker.clone();
            let reporter = reporter.clone();
            let indices = job.item_indices.clone();
            async move {
                for index in indices {
                    let update = tracker.record_remote_status(index, &state).await;
                    reporter.publish(update).await;
                }
            }
        })
        .await;

    active_jobs.write().await.remove(&job.job_id);

    let label = outcome.as_str();
    let elapsed = (Utc::now() - job.submitted_at).num_milliseconds().max(0) as f64 / 1000.0;
    metrics::JOBS_RESOLVED.with_label_values(&[label]).inc();
    metrics::JOB_DURATION
        .with_label_values(&[label])
        .observe(elapsed);
    info!("Job {} resolved as {} after {:.1}s", job.job_id, label, elapsed);

    match outcome {
        JobOutcome::Completed(output) => {
            apply_results(&job, output, &tracker, &reporter).await;
        }
        JobOutcome::Failed(e) => {
            fail_batch(&job, ItemStatus::Failed, e, &tracker, &reporter).await;
        }
        JobOutcome::Cancelled => {
            let e = JobError::Cancelled {
                job_id: job.job_id.clone(),
            };
            fail_batch(&job, ItemStatus::Cancelled, e, &tracker, &reporter).await;
        }
        JobOutcome::TimedOut(e) => {
            fail_batch(&job, ItemStatus::TimedOut, e, &tracker, &reporter).await;
        }
    }
}

/// Map result `j` of a completed job to the `j`-th item of its batch.
async fn apply_results<T: Clone>(
    job: &RemoteJob,
    output: Option<JobOutput>,
    tracker: &ItemTracker<T>,
    reporter: &Reporter<T>,
) {
    let (results, format) = match output {
        Some(output) => (output.results, output.format),
        None => (Vec::new(), None),
    };
    let format = format.filter(|format| {
        let usable = is_plain_format(format);
        if !usable {
            warn!("Job {} reported unusable format {:?}, keeping the requested one", job.job_id, format);
        }
        usable
    });

    for (position, &index) in job.item_indices.iter().enumerate() {
        let update = match decode_result(results.get(position)) {
            Ok(audio) => {
                tracker
                    .transition(index, ItemStatus::Completed, |item| {
                        item.audio = Some(audio);
                        if let Some(ref format) = format {
                            item.format = format.clone();
                        }
                    })
                    .await
            }
            Err(reason) => {
                warn!("Job {} returned no usable audio for item {}: {}", job.job_id, index, reason);
                let e = JobError::InvalidResult { index, reason };
                tracker
                    .transition(index, ItemStatus::Failed, |item| {
                        item.error = Some(e.to_string());
                    })
                    .await
            }
        };
        reporter.publish(update).await;
    }
}

/// Give every item of the job the same terminal status and reason.
async fn fail_batch<T: Clone>(
    job: &RemoteJob,
    status: ItemStatus,
    error: JobError,
    tracker: &ItemTracker<T>,
    reporter: &Reporter<T>,
) {
    let reason = error.to_string();
    for &index in &job.item_indices {
        let update = tracker
            .transition(index, status, |item| {
                item.error = Some(reason.clone());
            })
            .await;
        reporter.publish(update).await;
    }
}

/// Formats end up in file extensions, so only plain names are accepted.
fn is_plain_format(format: &str) -> bool {
    !format.is_empty() && format.chars().all(|c| c.is_ascii_alphanumeric())
}

fn decode_result(entry: Option<&serde_json::Value>) -> Result<Vec<u8>, String> {
    let encoded = match entry {
        None | Some(serde_json::Value::Null) => return Err("no result for this item".to_string()),
        Some(serde_json::Value::String(s)) => s,
        Some(_) => return Err("result is not a string".to_string()),
    };
    if encoded.is_empty() {
        return Err("result is empty".to_string());
    }
    let audio = STANDARD
        .decode(encoded)
        .map_err(|e| format!("invalid base64: {}", e))?;
    if audio.is_empty() {
        return Err("result is empty".to_string());
    }
    Ok(audio)
}

/// Forwards tracker updates to the observer of one orchestration.
///
/// Progress events are dropped when the observer falls behind. `Init` and
/// `Finalized` wait for room, but never past cancellation. A stalled
/// observer never holds back deadlines or cancellation.
struct Reporter<T> {
    observer: Option<ObserverHandle<T>>,
    cancel: CancellationToken,
}

impl<T> Clone for Reporter<T> {
    fn clone(&self) -> Self {
        Self {
            observer: self.observer.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: Clone> Reporter<T> {
    async fn init(&self, tracker: &ItemTracker<T>) {
        if let Some(ref observer) = self.observer {
            let snapshot = tracker.snapshot().await;
            observer.emit_until(ItemEvent::Init(snapshot), &self.cancel).await;
        }
    }

    fn batch_submitted(&self, batch_index: usize, job_id: String, item_count: usize) {
        if let Some(ref observer) = self.observer {
            observer.try_emit(ItemEvent::BatchSubmitted {
                batch_index,
                job_id,
                item_count,
            });
        }
    }

    /// Report an applied transition.
    async fn publish(&self, update: Option<TrackedItem<T>>) {
        let Some(item) = update else {
            return;
        };

        let terminal = item.status.is_terminal();
        if terminal {
            metrics::ITEMS_FINALIZED
                .with_label_values(&[item.status.as_str()])
                .inc();
        }

        if let Some(ref observer) = self.observer {
            if terminal {
                observer.try_emit(ItemEvent::StatusChanged(item.clone()));
                observer
                    .emit_until(ItemEvent::Finalized(item), &self.cancel)
                    .await;
            } else {
                observer.try_emit(ItemEvent::StatusChanged(item));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::observer_channel;
    use crate::remote::RemoteState;
    use crate::testing::{fixtures, MockRemoteClient, MockStep};

    fn orchestrator(client: &Arc<MockRemoteClient>) -> BatchOrchestrator {
        BatchOrchestrator::new(fixtures::test_config(), client.clone())
    }

    #[test]
    fn test_decode_result() {
        let valid = serde_json::Value::String(STANDARD.encode(b"RIFF"));
        assert_eq!(decode_result(Some(&valid)).unwrap(), b"RIFF".to_vec());

        assert!(decode_result(None).is_err());
        assert!(decode_result(Some(&serde_json::Value::Null)).is_err());
        assert!(decode_result(Some(&serde_json::json!(42))).is_err());
        assert!(decode_result(Some(&serde_json::json!(""))).is_err());
        assert!(decode_result(Some(&serde_json::json!("not base64!"))).is_err());
    }

    #[test]
    fn test_is_plain_format() {
        assert!(is_plain_format("wav"));
        assert!(is_plain_format("mp3"));
        assert!(!is_plain_format(""));
        assert!(!is_plain_format("../x"));
        assert!(!is_plain_format("wav/../../etc"));
        assert!(!is_plain_format("w av"));
    }

    #[tokio::test]
    async fn test_unusable_remote_format_keeps_requested() {
        let client = Arc::new(MockRemoteClient::new());
        let output = JobOutput {
            results: vec![serde_json::Value::String(STANDARD.encode(b"RIFF"))],
            format: Some("../x".to_string()),
            ..Default::default()
        };
        client.script(0, vec![MockStep::completed(output)]).await;

        let items = orchestrator(&client)
            .orchestrate(fixtures::work_items(&["a"]), OrchestrateOptions::default())
            .await
            .unwrap();

        assert_eq!(items[0].status, ItemStatus::Completed);
        assert_eq!(items[0].format, "wav");
    }

    #[tokio::test]
    async fn test_empty_input_returns_immediately() {
        let client = Arc::new(MockRemoteClient::new());
        let result = orchestrator(&client)
            .orchestrate(Vec::<WorkItem<()>>::new(), OrchestrateOptions::default())
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(client.submit_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let client = Arc::new(MockRemoteClient::new());
        let result = orchestrator(&client)
            .orchestrate(
                fixtures::work_items(&["a"]),
                OrchestrateOptions::default().with_batch_size(0),
            )
            .await;

        assert!(matches!(result, Err(OrchestratorError::InvalidOptions(_))));
        assert_eq!(client.submit_count().await, 0);
    }

    #[tokio::test]
    async fn test_results_are_mapped_by_position() {
        let client = Arc::new(MockRemoteClient::new());
        let items = orchestrator(&client)
            .orchestrate(
                fixtures::work_items(&["a", "b", "c", "d"]),
                OrchestrateOptions::default().with_batch_size(2),
            )
            .await
            .unwrap();

        assert_eq!(items.len(), 4);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(item.context, i);
            assert_eq!(item.status, ItemStatus::Completed);
            assert_eq!(item.audio.as_deref(), Some(fixtures::fake_audio(&item.text).as_slice()));
            assert_eq!(item.format, "wav");
            assert!(item.completed_at.is_some());
        }
        assert_eq!(client.submit_count().await, 2);
    }

    #[tokio::test]
    async fn test_missing_result_fails_only_that_item() {
        let client = Arc::new(MockRemoteClient::new());
        let output = JobOutput {
            results: vec![
                serde_json::Value::String(STANDARD.encode(b"first")),
                serde_json::Value::Null,
            ],
            format: Some("wav".to_string()),
            ..Default::default()
        };
        client.script(0, vec![MockStep::completed(output)]).await;

        let items = orchestrator(&client)
            .orchestrate(
                fixtures::work_items(&["a", "b", "c"]),
                OrchestrateOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(items[0].status, ItemStatus::Completed);
        assert_eq!(items[0].audio.as_deref(), Some(b"first".as_slice()));
        assert_eq!(items[1].status, ItemStatus::Failed);
        assert_eq!(items[2].status, ItemStatus::Failed);
        assert!(items[2].error.as_deref().unwrap().contains("no result"));
    }

    #[tokio::test]
    async fn test_remote_status_reaches_observer() {
        let client = Arc::new(MockRemoteClient::new());
        client
            .script(0, vec![MockStep::queued(), MockStep::CompleteAll])
            .await;
        let (observer, mut rx) = observer_channel(64);

        let items = orchestrator(&client)
            .orchestrate(
                fixtures::work_items(&["a"]),
                OrchestrateOptions::default().with_observer(observer),
            )
            .await
            .unwrap();
        assert_eq!(items[0].remote_status.as_deref(), Some("COMPLETED"));

        let mut changes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ItemEvent::StatusChanged(item) = event {
                changes.push((item.status, item.remote_status));
            }
        }
        assert_eq!(
            changes,
            vec![
                (ItemStatus::Submitted, None),
                (ItemStatus::Queued, Some("IN_QUEUE".to_string())),
                (ItemStatus::Queued, Some("COMPLETED".to_string())),
                (ItemStatus::Completed, Some("COMPLETED".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_remote_cancelled_job() {
        let client = Arc::new(MockRemoteClient::new());
        client
            .script(0, vec![MockStep::state(RemoteState::Cancelled)])
            .await;

        let items = orchestrator(&client)
            .orchestrate(fixtures::work_items(&["a", "b"]), OrchestrateOptions::default())
            .await
            .unwrap();

        for item in &items {
            assert_eq!(item.status, ItemStatus::Cancelled);
            assert_eq!(item.error.as_deref(), Some("job job-0 was cancelled"));
        }
    }

    #[tokio::test]
    async fn test_active_jobs_and_cancel_all() {
        let client = Arc::new(MockRemoteClient::new());
        client.set_default_script(vec![MockStep::running()]).await;
        let orchestrator = Arc::new(orchestrator(&client));
        let token = CancellationToken::new();

        let run = {
            let orchestrator = Arc::clone(&orchestrator);
            let token = token.clone();
            tokio::spawn(async move {
                orchestrator
                    .orchestrate(
                        fixtures::work_items(&["a", "b", "c", "d"]),
                        OrchestrateOptions::default()
                            .with_batch_size(2)
                            .with_cancel(token),
                    )
                    .await
            })
        };

        let mut active = Vec::new();
        for _ in 0..100 {
            active = orchestrator.active_jobs().await;
            if active.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(active, vec!["job-0".to_string(), "job-1".to_string()]);

        assert_eq!(orchestrator.cancel_all().await, 2);
        token.cancel();

        let items = run.await.unwrap().unwrap();
        assert!(items.iter().all(|i| i.status == ItemStatus::Cancelled));
        assert!(orchestrator.active_jobs().await.is_empty());
    }
}
