//! Event channel for observing item progress.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::types::TrackedItem;

/// Progress events emitted while an orchestration runs.
#[derive(Debug, Clone)]
pub enum ItemEvent<T> {
    /// Full snapshot of every item, sent once before any submission.
    Init(Vec<TrackedItem<T>>),
    /// An item changed status or remote status.
    StatusChanged(TrackedItem<T>),
    /// An item reached a terminal status. Sent exactly once per item.
    Finalized(TrackedItem<T>),
    /// A batch was accepted by the remote service.
    BatchSubmitted {
        batch_index: usize,
        job_id: String,
        item_count: usize,
    },
}

/// Handle for emitting item events.
///
/// Cheaply cloneable; every poller task holds one.
#[derive(Debug)]
pub struct ObserverHandle<T> {
    tx: mpsc::Sender<ItemEvent<T>>,
}

impl<T> Clone for ObserverHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ObserverHandle<T> {
    pub fn new(tx: mpsc::Sender<ItemEvent<T>>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity.
    ///
    /// A closed channel is logged; orchestration carries on without the
    /// observer.
    pub async fn emit(&self, event: ItemEvent<T>) {
        if self.tx.send(event).await.is_err() {
            tracing::error!("Failed to emit item event: observer channel closed");
        }
    }

    /// Emit an event without waiting.
    ///
    /// Returns `false` when the event was dropped because the channel is
    /// full or closed.
    pub fn try_emit(&self, event: ItemEvent<T>) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Observer channel full, dropping item event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!("Failed to emit item event: observer channel closed");
                false
            }
        }
    }

    /// Emit an event, waiting for capacity until `cancel` fires.
    ///
    /// Once cancelled the event is only sent if there is room left.
    pub async fn emit_until(&self, event: ItemEvent<T>, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(event);
                    true
                }
                Err(_) => {
                    tracing::error!("Failed to emit item event: observer channel closed");
                    false
                }
            },
            _ = cancel.cancelled() => self.try_emit(event),
        }
    }
}

/// Create an observer handle and the receiver that consumes its events.
pub fn observer_channel<T>(buffer: usize) -> (ObserverHandle<T>, mpsc::Receiver<ItemEvent<T>>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ObserverHandle::new(tx), rx)
}
