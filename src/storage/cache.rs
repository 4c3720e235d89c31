//! Bounded LRU cache of loaded snapshots
//!
//! Lookups take the read lock and bump an atomic recency stamp; inserts and
//! invalidations take the write lock. Eviction removes the entry with the
//! oldest stamp.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::Snapshot;

#[derive(Debug)]
struct Entry {
    snapshot: Arc<Snapshot>,
    last_used: AtomicU64,
}

/// Snapshot id -> Snapshot, least-recently-used eviction
#[derive(Debug)]
pub struct SnapshotCache {
    capacity: usize,
    clock: AtomicU64,
    entries: RwLock<HashMap<String, Entry>>,
}

impl SnapshotCache {
    /// A capacity of zero disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, id: &str) -> Option<Arc<Snapshot>> {
        let entries = self.entries.read();
        let entry = entries.get(id)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.snapshot))
    }

    pub fn insert(&self, snapshot: Arc<Snapshot>) {
        if self.capacity == 0 {
            return;
        }
        let stamp = self.tick();
        let mut entries = self.entries.write();
        if !entries.contains_key(&snapshot.id) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            snapshot.id.clone(),
            Entry {
                snapshot,
                last_used: AtomicU64::new(stamp),
            },
        );
    }

    pub fn invalidate(&self, id: &str) {
        self.entries.write().remove(id);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snap(id: &str) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(id, "aws", Utc::now()))
    }

    #[test]
    fn test_get_returns_inserted_snapshot() {
        let cache = SnapshotCache::new(2);
        cache.insert(snap("a"));
        assert_eq!(cache.get("a").unwrap().id, "a");
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = SnapshotCache::new(2);
        cache.insert(snap("a"));
        cache.insert(snap("b"));
        // Touch a so b becomes the eviction candidate
        cache.get("a");
        cache.insert(snap("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let cache = SnapshotCache::new(2);
        cache.insert(snap("a"));
        cache.insert(snap("b"));
        cache.insert(snap("a"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_invalidate_and_disabled_cache() {
        let cache = SnapshotCache::new(2);
        cache.insert(snap("a"));
        cache.invalidate("a");
        assert!(cache.is_empty());

        let disabled = SnapshotCache::new(0);
        disabled.insert(snap("a"));
        assert!(disabled.get("a").is_none());
    }
}
