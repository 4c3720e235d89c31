//! Snapshot storage module
//!
//! Provides the filesystem persistence layer:
//! - AtomicWriter: crash-safe write-then-rename with backups and recovery
//! - SnapshotStore: typed CRUD over snapshots, baselines and drift reports
//! - Header and streaming readers for cheap listings and huge documents
//! - Worker and buffer pools, LRU snapshot cache, batch operations

pub mod atomic;
pub mod cache;
mod concurrent;
pub mod header;
pub mod paths;
pub mod pool;
pub mod store;
pub mod stream;

pub use atomic::{AtomicWriter, CleanupStats};
pub use cache::SnapshotCache;
pub use store::{SnapshotStore, StoreOptions, StoreStats};
