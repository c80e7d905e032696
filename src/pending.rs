use crate::slot::SlotKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Slots marked dirty by watch callbacks and not yet consumed by a frame.
///
/// Cloning yields another handle to the same set. Writers may live on any
/// thread; draining is expected from the frame thread only. Marking the same
/// slot repeatedly before a drain collapses into a single entry whose
/// timestamp tracks the most recent mark.
#[derive(Debug, Clone, Default)]
pub struct PendingChangeSet {
    inner: Arc<Mutex<HashMap<SlotKey, Instant>>>,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&self, slot: SlotKey) {
        self.mark_dirty_at(slot, Instant::now());
    }

    pub fn mark_dirty_at(&self, slot: SlotKey, at: Instant) {
        let mut entries = self.lock();
        let last = entries.entry(slot).or_insert(at);
        if at > *last {
            *last = at;
        }
    }

    /// Empties the set and returns everything it held.
    pub fn drain_all(&self) -> Vec<SlotKey> {
        let drained = std::mem::take(&mut *self.lock());
        drained.into_keys().collect()
    }

    /// Removes and returns slots whose latest mark is at least `window` old.
    /// Younger marks stay pending for a later drain.
    pub fn drain_settled(&self, window: Duration) -> Vec<SlotKey> {
        self.drain_settled_at(window, Instant::now())
    }

    pub fn drain_settled_at(&self, window: Duration, now: Instant) -> Vec<SlotKey> {
        if window.is_zero() {
            return self.drain_all();
        }
        let mut entries = self.lock();
        let settled: Vec<SlotKey> = entries
            .iter()
            .filter(|(_, at)| now.saturating_duration_since(**at) >= window)
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in &settled {
            entries.remove(slot);
        }
        settled
    }

    pub fn contains(&self, slot: &SlotKey) -> bool {
        self.lock().contains_key(slot)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking writer cannot leave the map half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<SlotKey, Instant>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
