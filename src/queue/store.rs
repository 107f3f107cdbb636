//! Shared, ordered collection of queue items.
//!
//! The store is the only writer of item status. Every mutation replaces a whole
//! record keyed by id while holding the store lock, so callers can attach a
//! guard (for example, "is my run still current?") that is evaluated atomically
//! with the write.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::item::{reduce, ItemEvent, ItemId, NewItem, QueueItem, StatusKind};
use crate::audio::AudioClip;

/// Number of items in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub idle: usize,
    pub generating: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.idle + self.generating + self.completed + self.error
    }
}

/// Cheaply cloneable handle to the queue.
#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    items: Arc<Mutex<Vec<QueueItem>>>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a new item in `Idle` status.
    pub fn add(&self, item: NewItem) -> ItemId {
        let item = QueueItem::new(item);
        let id = item.id();
        log::debug!("Queue: added {} ({} chars)", id, item.text().chars().count());
        self.lock().push(item);
        id
    }

    /// Append several items, preserving their order.
    pub fn add_all(&self, items: impl IntoIterator<Item = NewItem>) -> Vec<ItemId> {
        let new_items: Vec<QueueItem> = items.into_iter().map(QueueItem::new).collect();
        let ids = new_items.iter().map(QueueItem::id).collect();
        self.lock().extend(new_items);
        ids
    }

    /// Remove an item and delete its playback file. The PCM itself is freed
    /// when the last snapshot holding the clip is dropped.
    pub fn remove(&self, id: ItemId) -> bool {
        let removed = {
            let mut items = self.lock();
            items
                .iter()
                .position(|item| item.id() == id)
                .map(|idx| items.remove(idx))
        };
        match removed {
            Some(item) => {
                if let Some(clip) = item.clip() {
                    clip.release();
                }
                log::info!("Queue: removed {}", id);
                true
            }
            None => false,
        }
    }

    /// Remove every item, releasing their audio. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<QueueItem> = std::mem::take(&mut *self.lock());
        for clip in drained.iter().filter_map(QueueItem::clip) {
            clip.release();
        }
        if !drained.is_empty() {
            log::info!("Queue: cleared {} items", drained.len());
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.lock().iter().any(|item| item.id() == id)
    }

    pub fn get(&self, id: ItemId) -> Option<QueueItem> {
        self.lock().iter().find(|item| item.id() == id).cloned()
    }

    /// Copy of the whole queue, in order.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.lock().clone()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in self.lock().iter() {
            match item.status().kind() {
                StatusKind::Idle => counts.idle += 1,
                StatusKind::Generating => counts.generating += 1,
                StatusKind::Completed => counts.completed += 1,
                StatusKind::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Audio of every completed item, in queue order.
    pub fn completed_clips(&self) -> Vec<Arc<AudioClip>> {
        self.lock()
            .iter()
            .filter_map(|item| item.clip().cloned())
            .collect()
    }

    /// Mark every `Idle`/`Error` item as `Generating` in one step and return
    /// them in queue order.
    pub fn claim_pending(&self) -> Vec<QueueItem> {
        self.claim_pending_if(|| true).unwrap_or_default()
    }

    /// Like `claim_pending`, but only if `guard` holds; `guard` runs while the
    /// store is locked. Returns `None` when the guard refused.
    pub fn claim_pending_if(&self, guard: impl FnOnce() -> bool) -> Option<Vec<QueueItem>> {
        let mut items = self.lock();
        if !guard() {
            return None;
        }
        let mut claimed = Vec::new();
        for item in items.iter_mut().filter(|item| item.status().is_pending()) {
            if let Some(next) = reduce(item.status(), ItemEvent::Dispatch) {
                item.status = next;
                claimed.push(item.clone());
            }
        }
        Some(claimed)
    }

    /// Run `f` while the store is locked, without touching any item.
    pub(crate) fn guarded<T>(&self, f: impl FnOnce() -> T) -> T {
        let _items = self.lock();
        f()
    }

    /// Apply `event` to one item.
    ///
    /// Returns false if the item is gone or the event doesn't apply to its
    /// current status.
    pub fn apply(&self, id: ItemId, event: ItemEvent) -> bool {
        self.apply_if(id, event, || true)
    }

    /// Apply `event` to one item only if `guard` holds; `guard` runs while the
    /// store is locked.
    pub fn apply_if(&self, id: ItemId, event: ItemEvent, guard: impl FnOnce() -> bool) -> bool {
        let mut items = self.lock();
        if !guard() {
            return false;
        }
        let Some(item) = items.iter_mut().find(|item| item.id() == id) else {
            return false;
        };
        match reduce(item.status(), event) {
            Some(next) => {
                log::debug!(
                    "Queue: {} {} -> {}",
                    id,
                    item.status().kind().as_str(),
                    next.kind().as_str()
                );
                item.status = next;
                true
            }
            None => {
                log::debug!(
                    "Queue: ignored event for {} in {}",
                    id,
                    item.status().kind().as_str()
                );
                false
            }
        }
    }

    /// Revert every `Generating` item to `Idle` if `guard` holds; `guard` runs
    /// while the store is locked. Returns how many items were reverted, or
    /// `None` when the guard refused.
    pub fn revert_generating_if(&self, guard: impl FnOnce() -> bool) -> Option<usize> {
        let mut items = self.lock();
        if !guard() {
            return None;
        }
        let mut reverted = 0;
        for item in items.iter_mut() {
            if let Some(next) = reduce(item.status(), ItemEvent::Revert) {
                item.status = next;
                reverted += 1;
            }
        }
        Some(reverted)
    }
}
