//! Typed persistence of snapshots, baselines and drift reports
//!
//! Layout under `base_dir`:
//! - `snapshots/<timestamp>-scan.json`
//! - `baselines/<sanitized name>-<YYYY-MM-DD>.json`
//! - `history/drift-reports/drift-report-<timestamp>.json`
//! - `cache/`
//! - `backups/` (owned by the atomic writer)
//!
//! Every document is UTF-8 JSON with two-space indentation. Loads validate
//! the identifier, confine the path to `base_dir` and refuse documents over
//! 50 MiB. Listings read only document headers and skip unreadable files.

use chrono::Utc;
use log::{debug, warn, Level};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::atomic::{AtomicWriter, CleanupStats};
use super::cache::SnapshotCache;
use super::header::{read_header, BaselineHeader, DriftReportHeader, SnapshotHeader};
use super::paths::{
    baseline_file_name, drift_report_file_name, ensure_within_base, is_document,
    snapshot_file_name, snapshot_file_name_with_id,
};
use super::pool::{build_thread_pool, worker_count, BufferPool};
use super::stream;
use crate::cancel::CancellationToken;
use crate::constants::{
    BACKUPS_DIR, BASELINES_DIR, BASELINE_VERSION, CACHE_DIR, DEFAULT_CACHE_CAPACITY,
    DOCUMENT_MODE, DRIFT_REPORTS_DIR, MAX_DOCUMENT_SIZE, SNAPSHOTS_DIR,
};
use crate::error::{Error, Phase, Result};
use crate::logging::{event, log_structured};
use crate::models::{
    validate_identifier, Baseline, BaselineInfo, DriftReport, DriftReportInfo, Resource,
    Severity, Snapshot, SnapshotInfo,
};

/// Tuning knobs for a store instance
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// LRU capacity in snapshots; zero disables the cache
    pub cache_capacity: usize,
    /// Keep a backup of every overwritten document
    pub backups: bool,
    /// Worker threads for batch operations; defaults to `min(CPU, 8)`
    pub workers: Option<usize>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            backups: true,
            workers: None,
        }
    }
}

/// Document counts and disk usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub snapshots: usize,
    pub baselines: usize,
    pub drift_reports: usize,
    pub total_bytes: u64,
}

/// Filesystem-backed store. Each instance owns its worker pool, buffer
/// pool, cache and writer; nothing is global.
pub struct SnapshotStore {
    base_dir: PathBuf,
    writer: AtomicWriter,
    cache: SnapshotCache,
    pub(super) buffers: BufferPool,
    pub(super) workers: rayon::ThreadPool,
    snapshot_index: Mutex<HashMap<String, PathBuf>>,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("base_dir", &self.base_dir)
            .field("workers", &self.workers.current_num_threads())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl SnapshotStore {
    /// Open (creating if needed) a store rooted at `base_dir`
    pub fn open(base_dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        for sub in [SNAPSHOTS_DIR, BASELINES_DIR, DRIFT_REPORTS_DIR, CACHE_DIR, BACKUPS_DIR] {
            let dir = base_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| Error::io(Phase::CreateDir, &dir, e))?;
        }
        let base_dir = base_dir
            .canonicalize()
            .map_err(|e| Error::io(Phase::Stat, base_dir, e))?;

        let writer = if options.backups {
            AtomicWriter::with_backups(base_dir.join(BACKUPS_DIR))
        } else {
            AtomicWriter::new()
        };
        let threads = options.workers.unwrap_or_else(worker_count).max(1);

        debug!("opened store at {} with {} workers", base_dir.display(), threads);
        Ok(Self {
            writer,
            cache: SnapshotCache::new(options.cache_capacity),
            buffers: BufferPool::new(threads * 2),
            workers: build_thread_pool(threads)?,
            snapshot_index: Mutex::new(HashMap::new()),
            base_dir,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn writer(&self) -> &AtomicWriter {
        &self.writer
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub(super) fn dir(&self, sub: &str) -> PathBuf {
        self.base_dir.join(sub)
    }

    // ==================== Snapshots ====================

    /// Persist a snapshot. Returns the path written.
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        snapshot.validate()?;
        let path = self.resolve_snapshot_path(snapshot)?;
        self.write_document(&path, snapshot)?;
        self.cache.invalidate(&snapshot.id);

        log_structured(
            Level::Info,
            &format!("Saved snapshot {}", snapshot.id),
            &event(
                "snapshot_saved",
                json!({
                    "id": snapshot.id,
                    "provider": snapshot.provider,
                    "resource_count": snapshot.resources.len(),
                    "path": path.display().to_string(),
                }),
            ),
        );
        Ok(path)
    }

    /// Pick the document path for a snapshot. A snapshot that shares its
    /// timestamp with a different stored snapshot gets an id-qualified name.
    fn resolve_snapshot_path(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        // Re-saving an id overwrites the document that already holds it
        if let Some(existing) = self.find_snapshot_path(&snapshot.id)? {
            return Ok(existing);
        }

        let dir = self.dir(SNAPSHOTS_DIR);
        let mut index = self.snapshot_index.lock();
        if let Some(known) = index.get(&snapshot.id) {
            return Ok(known.clone());
        }

        let primary = ensure_within_base(&self.base_dir, &dir.join(snapshot_file_name(&snapshot.timestamp)))?;
        let claimed_in_process = index
            .iter()
            .any(|(id, path)| path == &primary && id != &snapshot.id);
        let claimed_on_disk = primary.exists()
            && read_header::<SnapshotHeader>(&primary, &self.buffers)
                .map_or(true, |header| header.id != snapshot.id);

        let path = if claimed_in_process || claimed_on_disk {
            let name = snapshot_file_name_with_id(&snapshot.timestamp, &snapshot.id);
            ensure_within_base(&self.base_dir, &dir.join(name))?
        } else {
            primary
        };
        index.insert(snapshot.id.clone(), path.clone());
        Ok(path)
    }

    /// Load a snapshot by id, serving repeated loads from the cache
    pub fn load_snapshot(&self, id: &str) -> Result<Snapshot> {
        validate_identifier(id)?;
        if let Some(cached) = self.cache.get(id) {
            debug!("snapshot {} served from cache", id);
            return Ok((*cached).clone());
        }

        let path = self.find_snapshot_path(id)?.ok_or_else(|| Error::NotFound {
            what: "snapshot",
            id: id.to_string(),
        })?;
        let snapshot = self.load_snapshot_from_path(&path)?;
        if snapshot.id != id {
            return Err(Error::Internal(format!(
                "{} holds snapshot {} instead of {}",
                path.display(),
                snapshot.id,
                id
            )));
        }
        self.cache.insert(Arc::new(snapshot.clone()));
        Ok(snapshot)
    }

    pub(super) fn load_snapshot_from_path(&self, path: &Path) -> Result<Snapshot> {
        self.read_document(path)
    }

    /// Locate the document holding snapshot `id`
    pub fn find_snapshot_path(&self, id: &str) -> Result<Option<PathBuf>> {
        validate_identifier(id)?;
        if let Some(known) = self.snapshot_index.lock().get(id).cloned() {
            if known.exists() {
                return Ok(Some(known));
            }
        }

        for path in self.document_paths(SNAPSHOTS_DIR)? {
            match read_header::<SnapshotHeader>(&path, &self.buffers) {
                Ok(header) if header.id == id => {
                    self.snapshot_index.lock().insert(header.id, path.clone());
                    return Ok(Some(path));
                }
                Ok(_) => {}
                Err(err) => debug!("skipping {}: {}", path.display(), err),
            }
        }
        Ok(None)
    }

    /// Headers of all readable snapshots, newest first
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let mut infos: Vec<SnapshotInfo> = self
            .document_paths(SNAPSHOTS_DIR)?
            .iter()
            .filter_map(|path| skip_unreadable(path, self.snapshot_info(path)))
            .collect();
        sort_snapshot_infos(&mut infos);
        Ok(infos)
    }

    pub(super) fn snapshot_info(&self, path: &Path) -> Result<SnapshotInfo> {
        let header: SnapshotHeader = read_header(path, &self.buffers)?;
        let file_size = file_size(path)?;
        let (count, tags) = match header.metadata {
            Some(meta) => (meta.resource_count, meta.tags),
            None => (None, BTreeMap::new()),
        };
        // Count by streaming when the header does not carry a usable count
        let resource_count = match count {
            Some(n) if n > 0 => n,
            _ => stream::count_resources(path, &CancellationToken::new())?,
        };
        Ok(SnapshotInfo {
            id: header.id,
            timestamp: header.timestamp,
            provider: header.provider,
            resource_count,
            file_path: path.to_path_buf(),
            file_size,
            tags,
        })
    }

    /// Remove a snapshot. Returns false when it did not exist.
    pub fn delete_snapshot(&self, id: &str) -> Result<bool> {
        validate_identifier(id)?;
        self.cache.invalidate(id);
        let Some(path) = self.find_snapshot_path(id)? else {
            return Ok(false);
        };
        let removed = self.writer.remove(&path)?;
        self.snapshot_index.lock().remove(id);
        if removed {
            log_structured(
                Level::Info,
                &format!("Deleted snapshot {}", id),
                &event("snapshot_deleted", json!({"id": id, "path": path.display().to_string()})),
            );
        }
        Ok(removed)
    }

    /// Stream the resources of the document at `path` (which must lie in
    /// the store) without materialising the snapshot. The load size cap does
    /// not apply here.
    pub fn process_large_snapshot<F>(
        &self,
        path: &Path,
        cancel: &CancellationToken,
        visit: F,
    ) -> Result<usize>
    where
        F: FnMut(Resource) -> Result<()>,
    {
        let path = ensure_within_base(&self.base_dir, path)?;
        stream::for_each_resource(&path, cancel, visit)
    }

    /// Stream the resources of snapshot `id`
    pub fn stream_snapshot<F>(&self, id: &str, cancel: &CancellationToken, visit: F) -> Result<usize>
    where
        F: FnMut(Resource) -> Result<()>,
    {
        let path = self.find_snapshot_path(id)?.ok_or_else(|| Error::NotFound {
            what: "snapshot",
            id: id.to_string(),
        })?;
        self.process_large_snapshot(&path, cancel, visit)
    }

    /// Number of resources in the document at `path`, by streaming
    pub fn count_resources(&self, path: &Path, cancel: &CancellationToken) -> Result<usize> {
        self.process_large_snapshot(path, cancel, |_| Ok(()))
    }

    // ==================== Baselines ====================

    /// Designate an existing snapshot as a named baseline
    pub fn create_baseline(
        &self,
        name: &str,
        snapshot_id: &str,
        description: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<Baseline> {
        if self.find_snapshot_path(snapshot_id)?.is_none() {
            return Err(Error::NotFound {
                what: "snapshot",
                id: snapshot_id.to_string(),
            });
        }
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let baseline = Baseline {
            id: format!("baseline-{}", &suffix[..12]),
            name: name.to_string(),
            description: description.to_string(),
            snapshot_id: snapshot_id.to_string(),
            created_at: Utc::now(),
            version: BASELINE_VERSION.to_string(),
            tags,
            dangling: false,
        };
        self.save_baseline(&baseline)?;
        Ok(baseline)
    }

    pub fn save_baseline(&self, baseline: &Baseline) -> Result<PathBuf> {
        baseline.validate()?;
        let name = baseline_file_name(&baseline.name, &baseline.created_at);
        let path = ensure_within_base(&self.base_dir, &self.dir(BASELINES_DIR).join(name))?;
        self.write_document(&path, baseline)?;

        log_structured(
            Level::Info,
            &format!("Saved baseline {}", baseline.name),
            &event(
                "baseline_saved",
                json!({
                    "id": baseline.id,
                    "name": baseline.name,
                    "snapshot_id": baseline.snapshot_id,
                    "path": path.display().to_string(),
                }),
            ),
        );
        Ok(path)
    }

    /// Load a baseline by id or name. The newest baseline wins when several
    /// share a name. A missing referenced snapshot sets `dangling`.
    pub fn load_baseline(&self, id_or_name: &str) -> Result<Baseline> {
        validate_identifier(id_or_name)?;
        let path = self.find_baseline_path(id_or_name)?.ok_or_else(|| Error::NotFound {
            what: "baseline",
            id: id_or_name.to_string(),
        })?;
        let mut baseline: Baseline = self.read_document(&path)?;

        if self.find_snapshot_path(&baseline.snapshot_id)?.is_none() {
            baseline.dangling = true;
            log_structured(
                Level::Warn,
                &format!(
                    "Baseline {} references missing snapshot {}",
                    baseline.name, baseline.snapshot_id
                ),
                &event(
                    "baseline_dangling",
                    json!({"id": baseline.id, "snapshot_id": baseline.snapshot_id}),
                ),
            );
        }
        Ok(baseline)
    }

    fn find_baseline_path(&self, id_or_name: &str) -> Result<Option<PathBuf>> {
        let mut by_name: Option<(BaselineHeader, PathBuf)> = None;
        for path in self.document_paths(BASELINES_DIR)? {
            let header: BaselineHeader = match read_header(&path, &self.buffers) {
                Ok(header) => header,
                Err(err) => {
                    debug!("skipping {}: {}", path.display(), err);
                    continue;
                }
            };
            if header.id == id_or_name {
                return Ok(Some(path));
            }
            if header.name == id_or_name
                && by_name
                    .as_ref()
                    .map_or(true, |(best, _)| header.created_at > best.created_at)
            {
                by_name = Some((header, path));
            }
        }
        Ok(by_name.map(|(_, path)| path))
    }

    pub fn list_baselines(&self) -> Result<Vec<BaselineInfo>> {
        let mut infos: Vec<BaselineInfo> = self
            .document_paths(BASELINES_DIR)?
            .iter()
            .filter_map(|path| skip_unreadable(path, self.baseline_info(path)))
            .collect();
        infos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(infos)
    }

    fn baseline_info(&self, path: &Path) -> Result<BaselineInfo> {
        let header: BaselineHeader = read_header(path, &self.buffers)?;
        Ok(BaselineInfo {
            id: header.id,
            name: header.name,
            description: header.description,
            snapshot_id: header.snapshot_id,
            created_at: header.created_at,
            version: header.version,
            file_path: path.to_path_buf(),
            file_size: file_size(path)?,
            tags: header.tags,
        })
    }

    pub fn delete_baseline(&self, id_or_name: &str) -> Result<bool> {
        validate_identifier(id_or_name)?;
        match self.find_baseline_path(id_or_name)? {
            Some(path) => self.writer.remove(&path),
            None => Ok(false),
        }
    }

    // ==================== Drift reports ====================

    pub fn save_drift_report(&self, report: &DriftReport) -> Result<PathBuf> {
        validate_identifier(&report.id)?;
        let name = drift_report_file_name(&report.timestamp);
        let path = ensure_within_base(&self.base_dir, &self.dir(DRIFT_REPORTS_DIR).join(name))?;
        self.write_document(&path, report)?;

        log_structured(
            Level::Info,
            &format!("Saved drift report {}", report.id),
            &event(
                "drift_report_saved",
                json!({
                    "id": report.id,
                    "baseline_id": report.baseline_id,
                    "current_id": report.current_id,
                    "changes": report.resource_changes.len(),
                    "path": path.display().to_string(),
                }),
            ),
        );
        Ok(path)
    }

    pub fn load_drift_report(&self, id: &str) -> Result<DriftReport> {
        validate_identifier(id)?;
        let path = self.find_drift_report_path(id)?.ok_or_else(|| Error::NotFound {
            what: "drift report",
            id: id.to_string(),
        })?;
        self.read_document(&path)
    }

    fn find_drift_report_path(&self, id: &str) -> Result<Option<PathBuf>> {
        for path in self.document_paths(DRIFT_REPORTS_DIR)? {
            match read_header::<DriftReportHeader>(&path, &self.buffers) {
                Ok(header) if header.id == id => return Ok(Some(path)),
                Ok(_) => {}
                Err(err) => debug!("skipping {}: {}", path.display(), err),
            }
        }
        Ok(None)
    }

    pub fn list_drift_reports(&self) -> Result<Vec<DriftReportInfo>> {
        let mut infos: Vec<DriftReportInfo> = self
            .document_paths(DRIFT_REPORTS_DIR)?
            .iter()
            .filter_map(|path| skip_unreadable(path, self.drift_report_info(path)))
            .collect();
        infos.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(infos)
    }

    fn drift_report_info(&self, path: &Path) -> Result<DriftReportInfo> {
        let header: DriftReportHeader = read_header(path, &self.buffers)?;
        let (change_count, overall_risk) = header
            .summary
            .map(|s| (s.changed_resources, s.overall_risk))
            .unwrap_or((0, Severity::Low));
        Ok(DriftReportInfo {
            id: header.id,
            baseline_id: header.baseline_id,
            current_id: header.current_id,
            timestamp: header.timestamp,
            change_count,
            overall_risk,
            file_path: path.to_path_buf(),
            file_size: file_size(path)?,
        })
    }

    pub fn delete_drift_report(&self, id: &str) -> Result<bool> {
        validate_identifier(id)?;
        match self.find_drift_report_path(id)? {
            Some(path) => self.writer.remove(&path),
            None => Ok(false),
        }
    }

    // ==================== Maintenance ====================

    pub fn cleanup_backups(&self, max_age: Duration, max_count: usize) -> Result<CleanupStats> {
        self.writer.cleanup_backups(max_age, max_count)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for (sub, slot) in [
            (SNAPSHOTS_DIR, &mut stats.snapshots),
            (BASELINES_DIR, &mut stats.baselines),
            (DRIFT_REPORTS_DIR, &mut stats.drift_reports),
        ] {
            let paths = self.document_paths(sub)?;
            *slot = paths.len();
            for path in &paths {
                stats.total_bytes += file_size(path).unwrap_or(0);
            }
        }
        Ok(stats)
    }

    // ==================== Document I/O ====================

    pub(super) fn document_paths(&self, sub: &str) -> Result<Vec<PathBuf>> {
        let dir = self.dir(sub);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(Phase::List, &dir, e)),
        };
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_document(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn write_document<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let mut buf = self.buffers.get();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut *buf, formatter);
        value.serialize(&mut serializer)?;
        buf.push(b'\n');
        self.writer.write(path, &buf, DOCUMENT_MODE)
    }

    pub(super) fn read_document<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let path = ensure_within_base(&self.base_dir, path)?;
        check_size(&path)?;
        let bytes = self.writer.read(&path)?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Decode { path, source })
    }
}

/// Reject documents larger than the load cap
fn check_size(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_DOCUMENT_SIZE => Err(Error::FileTooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit: MAX_DOCUMENT_SIZE,
        }),
        Ok(_) => Ok(()),
        // Missing files fall through to the reader, which may recover them
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(Phase::Stat, path, e)),
    }
}

fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| Error::io(Phase::Stat, path, e))
}

/// Listing policy: log and drop files whose header cannot be read
pub(super) fn skip_unreadable<T>(path: &Path, result: Result<T>) -> Option<T> {
    match result {
        Ok(info) => Some(info),
        Err(err) => {
            warn!("Skipping unreadable document {}: {}", path.display(), err);
            None
        }
    }
}

pub(super) fn sort_snapshot_infos(infos: &mut [SnapshotInfo]) {
    infos.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
}
