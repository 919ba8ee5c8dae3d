//! Consumes orchestrator events: progress logs and chunk files.

use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use voxbatch_core::{ItemEvent, ItemStatus};

use crate::output::{size_kb, OutputWriter};
use crate::story::ChunkContext;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ProgressSummary {
    pub(crate) jobs_submitted: usize,
    pub(crate) chunks_written: usize,
    pub(crate) write_failures: usize,
    pub(crate) items_failed: usize,
}

/// Log events until the channel closes, writing each completed chunk once.
pub(crate) async fn report_progress(
    mut events: Receiver<ItemEvent<ChunkContext>>,
    writer: OutputWriter,
) -> ProgressSummary {
    let mut summary = ProgressSummary::default();

    while let Some(event) = events.recv().await {
        match event {
            ItemEvent::Init(items) => {
                let batches = items.first().map(|item| item.batch_total).unwrap_or(0);
                info!("Generating {} chunks in {} batches", items.len(), batches);
            }
            ItemEvent::BatchSubmitted {
                batch_index,
                job_id,
                item_count,
            } => {
                summary.jobs_submitted += 1;
                info!(
                    "Batch {} submitted as job {} ({} chunks)",
                    batch_index + 1,
                    job_id,
                    item_count
                );
            }
            ItemEvent::StatusChanged(item) => {
                debug!(
                    "{}: {} ({})",
                    item.label,
                    item.status,
                    item.remote_status.as_deref().unwrap_or("-")
                );
            }
            ItemEvent::Finalized(item) => match (item.status, item.audio.as_deref()) {
                (ItemStatus::Completed, Some(audio)) => {
                    let context = &item.context;
                    match writer
                        .write_chunk(&context.story, context.chunk, &item.format, audio)
                        .await
                    {
                        Ok(path) => {
                            summary.chunks_written += 1;
                            info!(
                                "Saved {} ({:.1} KB, {}ms)",
                                path.display(),
                                size_kb(audio),
                                item.elapsed_ms.unwrap_or(0)
                            );
                        }
                        Err(e) => {
                            summary.write_failures += 1;
                            warn!("Failed to save {}: {:#}", item.label, e);
                        }
                    }
                }
                (status, _) => {
                    summary.items_failed += 1;
                    warn!(
                        "{} {}: {}",
                        item.label,
                        status,
                        item.error.as_deref().unwrap_or("no audio")
                    );
                }
            },
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbatch_core::{observer_channel, TrackedItem};

    fn tracked(chunk: usize, status: ItemStatus, audio: Option<&[u8]>) -> TrackedItem<ChunkContext> {
        TrackedItem {
            index: chunk,
            label: format!("kat/chunk_{:02}", chunk),
            text: "[S1] Hallo".to_string(),
            context: ChunkContext {
                story: "kat".to_string(),
                chunk,
            },
            status,
            audio: audio.map(|a| a.to_vec()),
            format: "wav".to_string(),
            error: (status != ItemStatus::Completed).then(|| "job job-0 failed: boom".to_string()),
            submitted_at: None,
            completed_at: None,
            elapsed_ms: Some(1200),
            batch_index: 0,
            batch_total: 1,
            remote_status: None,
            job_id: Some("job-0".to_string()),
        }
    }

    #[tokio::test]
    async fn test_completed_chunks_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let (observer, rx) = observer_channel(16);
        let task = tokio::spawn(report_progress(rx, OutputWriter::new(dir.path())));

        observer
            .emit(ItemEvent::Init(vec![
                tracked(0, ItemStatus::Pending, None),
                tracked(1, ItemStatus::Pending, None),
            ]))
            .await;
        observer
            .emit(ItemEvent::BatchSubmitted {
                batch_index: 0,
                job_id: "job-0".to_string(),
                item_count: 2,
            })
            .await;
        observer
            .emit(ItemEvent::StatusChanged(tracked(0, ItemStatus::Running, None)))
            .await;
        observer
            .emit(ItemEvent::Finalized(tracked(0, ItemStatus::Completed, Some(b"RIFF0"))))
            .await;
        observer
            .emit(ItemEvent::Finalized(tracked(1, ItemStatus::Failed, None)))
            .await;
        drop(observer);

        let summary = task.await.unwrap();
        assert_eq!(
            summary,
            ProgressSummary {
                jobs_submitted: 1,
                chunks_written: 1,
                write_failures: 0,
                items_failed: 1,
            }
        );
        let chunk = dir.path().join("kat").join("chunk_00.wav");
        assert_eq!(std::fs::read(chunk).unwrap(), b"RIFF0");
        assert!(!dir.path().join("kat").join("chunk_01.wav").exists());
    }

    #[tokio::test]
    async fn test_status_changes_do_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let (observer, rx) = observer_channel(4);
        let task = tokio::spawn(report_progress(rx, OutputWriter::new(dir.path())));

        observer
            .emit(ItemEvent::StatusChanged(tracked(0, ItemStatus::Completed, Some(b"RIFF"))))
            .await;
        drop(observer);

        let summary = task.await.unwrap();
        assert_eq!(summary.chunks_written, 0);
        assert!(!dir.path().join("kat").exists());
    }
}
