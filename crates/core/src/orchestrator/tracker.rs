//! Per-item state owned by one orchestration.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::remote::RemoteState;

use super::types::{ItemStatus, TrackedItem};

/// Table of tracked items, one lock per slot.
///
/// Each poller task only writes the slots of its own batch, so tasks never
/// contend with each other; snapshots read every slot.
pub struct ItemTracker<T> {
    slots: Arc<Vec<RwLock<TrackedItem<T>>>>,
}

impl<T> Clone for ItemTracker<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T: Clone> ItemTracker<T> {
    pub fn new(items: Vec<TrackedItem<T>>) -> Self {
        Self {
            slots: Arc::new(items.into_iter().map(RwLock::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Move an item to `status`, applying `mutate` first.
    ///
    /// Returns the updated snapshot, or `None` when the transition is not
    /// allowed (e.g. the item is already terminal). Reaching a terminal
    /// status records the completion time.
    pub async fn transition<F>(
        &self,
        index: usize,
        status: ItemStatus,
        mutate: F,
    ) -> Option<TrackedItem<T>>
    where
        F: FnOnce(&mut TrackedItem<T>),
    {
        let slot = self.slots.get(index)?;
        let mut item = slot.write().await;

        if !item.status.can_transition_to(status) {
            debug!(
                "Ignoring transition of item {} from {} to {}",
                index, item.status, status
            );
            return None;
        }

        mutate(&mut item);
        item.status = status;
        if status.is_terminal() {
            item.mark_completed();
        }
        Some(item.clone())
    }

    /// Record a raw status report from the remote service.
    ///
    /// Queued/running reports move the item accordingly; other strings only
    /// update `remote_status`. Returns the snapshot when anything changed.
    pub async fn record_remote_status(
        &self,
        index: usize,
        raw: &RemoteState,
    ) -> Option<TrackedItem<T>> {
        let slot = self.slots.get(index)?;
        let mut item = slot.write().await;

        if item.status.is_terminal() {
            return None;
        }

        let next = ItemStatus::from_remote_progress(raw)
            .filter(|next| item.status.can_transition_to(*next))
            .unwrap_or(item.status);
        let raw = raw.as_str();

        let changed =
            next != item.status || item.remote_status.as_deref() != Some(raw);
        if !changed {
            return None;
        }

        item.status = next;
        item.remote_status = Some(raw.to_string());
        Some(item.clone())
    }

    pub async fn get(&self, index: usize) -> Option<TrackedItem<T>> {
        match self.slots.get(index) {
            Some(slot) => Some(slot.read().await.clone()),
            None => None,
        }
    }

    /// Clone every item, in input order.
    pub async fn snapshot(&self) -> Vec<TrackedItem<T>> {
        let mut items = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            items.push(slot.read().await.clone());
        }
        items
    }

    /// Consume the tracker and return the items in input order.
    ///
    /// Falls back to a snapshot if another handle is still alive.
    pub async fn into_items(self) -> Vec<TrackedItem<T>> {
        match Arc::try_unwrap(self.slots) {
            Ok(slots) => slots.into_iter().map(RwLock::into_inner).collect(),
            Err(slots) => ItemTracker { slots }.snapshot().await,
        }
    }
}
