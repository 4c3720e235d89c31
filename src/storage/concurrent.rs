//! Batch operations fanned out over the store's worker pool
//!
//! Every task checks the cancellation token before it starts. Writes that
//! already started run to completion; queued tasks are dropped and the
//! batch reports `Cancelled`.

use log::Level;
use rayon::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;

use super::header::{read_header, SnapshotHeader};
use super::store::{skip_unreadable, sort_snapshot_infos, SnapshotStore};
use crate::cancel::CancellationToken;
use crate::constants::SNAPSHOTS_DIR;
use crate::error::{Error, Result};
use crate::logging::{event, log_structured};
use crate::models::{validate_identifier, Snapshot, SnapshotInfo};

impl SnapshotStore {
    /// List snapshots with header reads spread across the worker pool.
    /// Unreadable files are skipped; the result is sorted newest first.
    pub fn list_concurrent(&self, cancel: &CancellationToken) -> Result<Vec<SnapshotInfo>> {
        cancel.check()?;
        let paths = self.document_paths(SNAPSHOTS_DIR)?;

        let results: Vec<Option<SnapshotInfo>> = self.workers.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    skip_unreadable(path, self.snapshot_info(path))
                })
                .collect()
        });
        cancel.check()?;

        let mut infos: Vec<SnapshotInfo> = results.into_iter().flatten().collect();
        sort_snapshot_infos(&mut infos);
        Ok(infos)
    }

    /// Save a batch of snapshots. Nothing is written unless every snapshot
    /// validates. Partial failures report the failure count and the first
    /// error; no ordering between files is guaranteed.
    pub fn save_many(&self, cancel: &CancellationToken, snapshots: &[Snapshot]) -> Result<Vec<PathBuf>> {
        for snapshot in snapshots {
            snapshot.validate()?;
        }
        cancel.check()?;

        let results: Vec<Result<PathBuf>> = self.workers.install(|| {
            snapshots
                .par_iter()
                .map(|snapshot| {
                    cancel.check()?;
                    self.save_snapshot(snapshot)
                })
                .collect()
        });
        cancel.check()?;

        let total = results.len();
        let mut saved = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(path) => saved.push(path),
                Err(err) => failures.push(err),
            }
        }

        if failures.is_empty() {
            return Ok(saved);
        }
        let failed = failures.len();
        let first = failures.swap_remove(0);
        log_structured(
            Level::Error,
            &format!("Batch save failed for {} of {} snapshots", failed, total),
            &event(
                "batch_save_failed",
                json!({"failed": failed, "total": total, "first_error": first.to_string()}),
            ),
        );
        Err(Error::Batch {
            action: "save",
            failed,
            total,
            first: Box::new(first),
        })
    }

    /// Load several snapshots by id. Ids with no stored document are
    /// omitted from the result; any other load failure fails the batch.
    pub fn load_many(&self, cancel: &CancellationToken, ids: &[String]) -> Result<Vec<Snapshot>> {
        for id in ids {
            validate_identifier(id)?;
        }
        cancel.check()?;

        // Phase one: map ids to paths from document headers
        let paths = self.document_paths(SNAPSHOTS_DIR)?;
        let headers: Vec<Option<(String, PathBuf)>> = self.workers.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    read_header::<SnapshotHeader>(path, &self.buffers)
                        .ok()
                        .map(|header| (header.id, path.clone()))
                })
                .collect()
        });
        cancel.check()?;
        let index: HashMap<String, PathBuf> = headers.into_iter().flatten().collect();

        // Phase two: full loads of the requested ids, cache first
        let results: Vec<Result<Option<Snapshot>>> = self.workers.install(|| {
            ids.par_iter()
                .map(|id| {
                    cancel.check()?;
                    if let Some(cached) = self.cache().get(id) {
                        return Ok(Some((*cached).clone()));
                    }
                    match index.get(id) {
                        Some(path) => self.load_snapshot_from_path(path).map(Some),
                        None => Ok(None),
                    }
                })
                .collect()
        });
        cancel.check()?;

        let mut snapshots = Vec::with_capacity(ids.len());
        for result in results {
            if let Some(snapshot) = result? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use crate::cancel::CancellationToken;
    use crate::error::Error;
    use crate::models::{Resource, Snapshot};
    use crate::storage::{SnapshotStore, StoreOptions};
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn batch(n: usize) -> Vec<Snapshot> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                Snapshot::new(format!("snap-{}", i), "aws", start + Duration::minutes(i as i64))
                    .with_resources(vec![Resource::new(format!("i-{}", i), "instance", "vm", "aws")])
            })
            .collect()
    }

    #[test]
    fn test_save_many_then_list_concurrent() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), StoreOptions::default()).unwrap();
        let cancel = CancellationToken::new();

        let paths = store.save_many(&cancel, &batch(12)).unwrap();
        assert_eq!(paths.len(), 12);

        let infos = store.list_concurrent(&cancel).unwrap();
        assert_eq!(infos.len(), 12);
        assert_eq!(infos[0].id, "snap-11");
        assert_eq!(infos[11].id, "snap-0");
    }

    #[test]
    fn test_save_many_validates_everything_first() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), StoreOptions::default()).unwrap();
        let mut snapshots = batch(3);
        snapshots[2].id = "bad/id".to_string();

        let err = store.save_many(&CancellationToken::new(), &snapshots).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(store.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_batch_returns_cancelled() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), StoreOptions::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(store.save_many(&cancel, &batch(3)).unwrap_err().is_cancelled());
        assert!(store.list_concurrent(&cancel).unwrap_err().is_cancelled());
        assert!(store.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_load_many_omits_missing_ids() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::open(dir.path(), StoreOptions::default()).unwrap();
        let cancel = CancellationToken::new();
        store.save_many(&cancel, &batch(4)).unwrap();

        let ids = vec!["snap-1".to_string(), "ghost".to_string(), "snap-3".to_string()];
        let loaded = store.load_many(&cancel, &ids).unwrap();
        let got: Vec<_> = loaded.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(got, vec!["snap-1", "snap-3"]);
    }
}
