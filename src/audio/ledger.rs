//! Which downloaded files are still needed.
//!
//! Audio files are shared by every session that queues the same track id. The
//! ledger counts queue entries per id across all sessions and hands out a
//! per-id lock. Acquisition holds that lock from "file is there" to "entry is
//! queued", and the driver holds it from "no entry left" to "file deleted", so
//! the two never interleave.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::track::TrackId;

#[derive(Debug, Default)]
pub struct TrackLedger {
    references: DashMap<TrackId, usize>,
    locks: DashMap<TrackId, Arc<Mutex<()>>>,
}

impl TrackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more queue entry for `id`.
    pub fn retain(&self, id: &TrackId) {
        *self.references.entry(id.clone()).or_insert(0) += 1;
    }

    /// Counts one queue entry of `id` less.
    pub fn forget(&self, id: &TrackId) {
        if let Some(mut count) = self.references.get_mut(id) {
            *count = count.saturating_sub(1);
        }
        self.references.remove_if(id, |_, count| *count == 0);
    }

    /// Whether any session still queues `id`.
    pub fn is_referenced(&self, id: &TrackId) -> bool {
        self.references.get(id).is_some_and(|count| *count > 0)
    }

    /// Waits for exclusive use of the file of `id`.
    pub async fn lock(self: &Arc<Self>, id: &TrackId) -> TrackLock {
        let mutex = self.locks.entry(id.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;

        TrackLock {
            ledger: self.clone(),
            id: id.clone(),
            guard: Some(guard),
        }
    }
}

/// Exclusive use of one track file; released on drop.
pub struct TrackLock {
    ledger: Arc<TrackLedger>,
    id: TrackId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TrackLock {
    fn drop(&mut self) {
        self.guard.take();
        // Nobody holds or waits for the mutex once the map owns the only handle
        self.ledger
            .locks
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
