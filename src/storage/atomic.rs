//! Crash-safe file writer
//!
//! A successful `write(path, bytes, mode)` leaves `path` containing exactly
//! `bytes`; concurrent readers never observe a partial write.
//!
//! Write protocol:
//! 1. Take the per-path exclusive lock
//! 2. Remove stale `<name>.tmp.*` files left by an interrupted writer
//! 3. Copy the current file into the backup directory (when configured)
//! 4. Write and fsync `<path>.tmp.<random>`
//! 5. Re-read the temp file and compare SHA-256 with the input
//! 6. Rename the temp file over `path`, then fsync the directory
//!
//! Reads take the shared lock. A missing or empty file is recovered from
//! the newest matching backup.

use chrono::Utc;
use glob::Pattern;
use log::{debug, Level};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::constants::{BACKUP_EXTENSION, BACKUP_TIMESTAMP_FORMAT, DOCUMENT_MODE, TEMP_MARKER};
use crate::error::{Error, Phase, Result};
use crate::logging::{event, log_structured};

/// Process-scoped writer owning the per-path lock table
#[derive(Debug, Default)]
pub struct AtomicWriter {
    backup_dir: Option<PathBuf>,
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
}

/// Outcome of a backup cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub examined: usize,
    pub removed: usize,
}

impl AtomicWriter {
    /// Writer without backups
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer that snapshots existing files into `backup_dir` before overwriting
    pub fn with_backups(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: Some(backup_dir.into()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn backup_dir(&self) -> Option<&Path> {
        self.backup_dir.as_deref()
    }

    /// Lock for `path`, created on first use and retained afterwards
    fn lock_for(&self, path: &Path) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Atomically replace `path` with `bytes`
    pub fn write(&self, path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
        let lock = self.lock_for(path);
        let _guard = lock.write();
        self.write_locked(path, bytes, mode)
    }

    fn write_locked(&self, path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| Error::io(Phase::CreateDir, parent, e))?;

        remove_stale_temps(path);
        self.backup_existing(path)?;

        let temp = temp_path(path);
        if let Err(err) = write_temp(&temp, bytes, mode) {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }

        // Check for silent truncation before the temp file becomes visible
        if let Err(err) = verify(&temp, bytes, path) {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }

        if let Err(e) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(Error::io(Phase::Rename, path, e));
        }

        sync_dir(parent);
        debug!("atomically wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn backup_existing(&self, path: &Path) -> Result<()> {
        let Some(backup_dir) = &self.backup_dir else {
            return Ok(());
        };
        let len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(Phase::Stat, path, e)),
        };
        if len == 0 {
            return Ok(());
        }

        fs::create_dir_all(backup_dir).map_err(|e| Error::io(Phase::CreateDir, backup_dir, e))?;
        let backup = backup_dir.join(backup_file_name(path));
        fs::copy(path, &backup).map_err(|e| Error::io(Phase::Backup, &backup, e))?;
        debug!("backed up {} to {}", path.display(), backup.display());
        Ok(())
    }

    /// Read `path`, recovering from the newest backup if it is missing or empty
    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        {
            let lock = self.lock_for(path);
            let _guard = lock.read();
            match fs::read(path) {
                Ok(bytes) if !bytes.is_empty() => return Ok(bytes),
                Ok(_) => debug!("{} is empty, attempting recovery", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("{} is missing, attempting recovery", path.display())
                }
                Err(e) => return Err(Error::io(Phase::Read, path, e)),
            }
        }
        self.recover(path)
    }

    fn recover(&self, path: &Path) -> Result<Vec<u8>> {
        let backup = self.latest_backup(path)?.ok_or_else(|| Error::NotFound {
            what: "file",
            id: path.display().to_string(),
        })?;
        let bytes = fs::read(&backup).map_err(|e| Error::io(Phase::Read, &backup, e))?;
        self.write(path, &bytes, DOCUMENT_MODE)?;

        log_structured(
            Level::Warn,
            &format!("Recovered {} from backup", path.display()),
            &event(
                "backup_restored",
                json!({
                    "path": path.display().to_string(),
                    "backup": backup.display().to_string(),
                    "bytes": bytes.len(),
                }),
            ),
        );
        Ok(bytes)
    }

    /// Newest backup (by modification time) belonging to `path`
    pub fn latest_backup(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(backup_dir) = &self.backup_dir else {
            return Ok(None);
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        let pattern = Pattern::new(&format!("{}.*{}", Pattern::escape(name), BACKUP_EXTENSION))
            .map_err(|e| Error::Internal(format!("invalid backup pattern: {}", e)))?;

        let newest = list_backups(backup_dir)?
            .into_iter()
            .filter(|b| pattern.matches(&b.file_name) && b.original == name)
            .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.file_name.cmp(&b.file_name)));
        Ok(newest.map(|b| b.path))
    }

    /// Remove `path` under its exclusive lock. Returns false if it did not exist.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        let lock = self.lock_for(path);
        let _guard = lock.write();
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(Phase::Remove, path, e)),
        }
    }

    /// Delete backups older than `max_age`, then keep only the `max_count`
    /// newest backups per original file.
    pub fn cleanup_backups(&self, max_age: Duration, max_count: usize) -> Result<CleanupStats> {
        let Some(backup_dir) = &self.backup_dir else {
            return Ok(CleanupStats::default());
        };

        let mut groups: BTreeMap<String, Vec<BackupEntry>> = BTreeMap::new();
        let backups = list_backups(backup_dir)?;
        let mut stats = CleanupStats {
            examined: backups.len(),
            removed: 0,
        };
        for backup in backups {
            groups.entry(backup.original.clone()).or_default().push(backup);
        }

        let now = SystemTime::now();
        for (_, mut entries) in groups {
            entries.sort_by(|a, b| b.modified.cmp(&a.modified));

            let (fresh, aged): (Vec<_>, Vec<_>) = entries.into_iter().partition(|b| {
                now.duration_since(b.modified).unwrap_or_default() <= max_age
            });
            let excess = fresh.into_iter().skip(max_count);

            for backup in aged.into_iter().chain(excess) {
                match fs::remove_file(&backup.path) {
                    Ok(()) => stats.removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::io(Phase::Remove, &backup.path, e)),
                }
            }
        }

        if stats.removed > 0 {
            log_structured(
                Level::Info,
                "Cleaned up backups",
                &event(
                    "backups_cleaned",
                    json!({"examined": stats.examined, "removed": stats.removed}),
                ),
            );
        }
        Ok(stats)
    }
}

#[derive(Debug)]
struct BackupEntry {
    path: PathBuf,
    file_name: String,
    original: String,
    modified: SystemTime,
}

fn list_backups(dir: &Path) -> Result<Vec<BackupEntry>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(Phase::List, dir, e)),
    };

    let mut backups = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let Some(original) = original_name(&file_name) else {
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        backups.push(BackupEntry {
            path,
            file_name,
            original,
            modified,
        });
    }
    Ok(backups)
}

/// `name.20240101-120000.backup` -> `name`
pub fn original_name(backup_name: &str) -> Option<String> {
    let stem = backup_name.strip_suffix(BACKUP_EXTENSION)?;
    let (original, stamp) = stem.rsplit_once('.')?;
    let well_formed = stamp.len() == 15
        && stamp.char_indices().all(|(i, c)| if i == 8 { c == '-' } else { c.is_ascii_digit() });
    if well_formed && !original.is_empty() {
        Some(original.to_string())
    } else {
        None
    }
}

/// `<basename>.<yyyymmdd-hhmmss>.backup`
pub fn backup_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.{}{}", name, Utc::now().format(BACKUP_TIMESTAMP_FORMAT), BACKUP_EXTENSION)
}

fn temp_path(path: &Path) -> PathBuf {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_MARKER);
    name.push(&suffix[..8]);
    PathBuf::from(name)
}

fn write_temp(temp: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp)
        .map_err(|e| Error::io(Phase::WriteTemp, temp, e))?;
    file.write_all(bytes)
        .map_err(|e| Error::io(Phase::WriteTemp, temp, e))?;
    file.sync_all().map_err(|e| Error::io(Phase::Sync, temp, e))?;
    set_mode(temp, mode)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(Phase::WriteTemp, path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Compare the temp file's hash with the input; mismatches are reported against `target`
fn verify(temp: &Path, expected_bytes: &[u8], target: &Path) -> Result<()> {
    let written = fs::read(temp).map_err(|e| Error::io(Phase::Verify, temp, e))?;
    let expected = hex::encode(Sha256::digest(expected_bytes));
    let actual = hex::encode(Sha256::digest(&written));
    if expected != actual {
        return Err(Error::Integrity {
            path: target.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Remove `<name>.tmp.*` siblings left behind by a writer that died mid-write
fn remove_stale_temps(path: &Path) {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str())) else {
        return;
    };
    let prefix = format!("{}{}", name, TEMP_MARKER);
    let Ok(entries) = fs::read_dir(if parent.as_os_str().is_empty() { Path::new(".") } else { parent }) else {
        return;
    };
    for entry in entries.flatten() {
        let stale = entry
            .file_name()
            .to_str()
            .map_or(false, |n| n.starts_with(&prefix));
        if stale {
            match fs::remove_file(entry.path()) {
                Ok(()) => debug!("removed stale temp file {}", entry.path().display()),
                Err(e) => debug!("could not remove stale temp {}: {}", entry.path().display(), e),
            }
        }
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("directory fsync failed for {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|n| n.contains(TEMP_MARKER))
            .collect()
    }

    // ==================== Write/read tests ====================

    #[test]
    fn test_write_then_read_returns_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let writer = AtomicWriter::new();

        writer.write(&path, b"{\"a\":1}", DOCUMENT_MODE).unwrap();
        assert_eq!(writer.read(&path).unwrap(), b"{\"a\":1}");
        assert!(temp_files(path.parent().unwrap()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_applies_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        AtomicWriter::new().write(&path, b"x", 0o600).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_overwrite_creates_backup() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("backups");
        let path = dir.path().join("doc.json");
        let writer = AtomicWriter::with_backups(&backups);

        writer.write(&path, b"first", DOCUMENT_MODE).unwrap();
        writer.write(&path, b"second", DOCUMENT_MODE).unwrap();

        let latest = writer.latest_backup(&path).unwrap().unwrap();
        assert_eq!(fs::read(latest).unwrap(), b"first");
        assert_eq!(writer.read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_stale_temp_files_are_removed_on_next_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let writer = AtomicWriter::new();
        writer.write(&path, &[7u8; 1024], DOCUMENT_MODE).unwrap();

        // A writer that died before rename leaves its temp file behind
        fs::write(dir.path().join("doc.json.tmp.deadbeef"), b"partial").unwrap();
        assert_eq!(writer.read(&path).unwrap(), vec![7u8; 1024]);

        writer.write(&path, b"next", DOCUMENT_MODE).unwrap();
        assert!(temp_files(dir.path()).is_empty());
    }

    // ==================== Recovery tests ====================

    #[test]
    fn test_read_recovers_empty_file_from_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let writer = AtomicWriter::with_backups(dir.path().join("backups"));

        writer.write(&path, b"good", DOCUMENT_MODE).unwrap();
        writer.write(&path, b"newer", DOCUMENT_MODE).unwrap();
        fs::write(&path, b"").unwrap();

        assert_eq!(writer.read(&path).unwrap(), b"good");
        assert_eq!(fs::read(&path).unwrap(), b"good");
    }

    #[test]
    fn test_read_recovers_missing_file_from_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let writer = AtomicWriter::with_backups(dir.path().join("backups"));

        writer.write(&path, b"v1", DOCUMENT_MODE).unwrap();
        writer.write(&path, b"v2", DOCUMENT_MODE).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(writer.read(&path).unwrap(), b"v1");
    }

    #[test]
    fn test_read_missing_without_backup_is_not_found() {
        let dir = tempdir().unwrap();
        let writer = AtomicWriter::with_backups(dir.path().join("backups"));
        let err = writer.read(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_latest_backup_ignores_other_files() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("backups");
        fs::create_dir_all(&backups).unwrap();
        fs::write(backups.join("doc.json.x.20240101-000000.backup"), b"other").unwrap();
        fs::write(backups.join("doc.json.20240101-000000.backup"), b"mine").unwrap();

        let writer = AtomicWriter::with_backups(&backups);
        let latest = writer.latest_backup(&dir.path().join("doc.json")).unwrap().unwrap();
        assert_eq!(fs::read(latest).unwrap(), b"mine");
    }

    // ==================== Cleanup tests ====================

    #[test]
    fn test_original_name_parsing() {
        assert_eq!(original_name("a.json.20240101-120000.backup").as_deref(), Some("a.json"));
        assert_eq!(original_name("a.json.2024-0101.backup"), None);
        assert_eq!(original_name("a.json"), None);
    }

    #[test]
    fn test_cleanup_keeps_newest_per_group() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("backups");
        fs::create_dir_all(&backups).unwrap();
        for stamp in ["20240101-000001", "20240101-000002", "20240101-000003"] {
            fs::write(backups.join(format!("a.json.{}.backup", stamp)), stamp).unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }
        fs::write(backups.join("b.json.20240101-000001.backup"), b"b").unwrap();

        let writer = AtomicWriter::with_backups(&backups);
        let stats = writer
            .cleanup_backups(Duration::from_secs(3600), 1)
            .unwrap();

        assert_eq!(stats.examined, 4);
        assert_eq!(stats.removed, 2);
        assert!(backups.join("a.json.20240101-000003.backup").exists());
        assert!(backups.join("b.json.20240101-000001.backup").exists());
    }

    #[test]
    fn test_cleanup_removes_aged_backups() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("backups");
        fs::create_dir_all(&backups).unwrap();
        fs::write(backups.join("a.json.20200101-000000.backup"), b"old").unwrap();

        let writer = AtomicWriter::with_backups(&backups);
        std::thread::sleep(Duration::from_millis(20));
        let stats = writer.cleanup_backups(Duration::from_millis(1), 10).unwrap();
        assert_eq!(stats.removed, 1);
    }

    // ==================== Concurrency tests ====================

    #[test]
    fn test_concurrent_writers_leave_a_complete_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let writer = Arc::new(AtomicWriter::new());

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let writer = Arc::clone(&writer);
                let path = path.clone();
                std::thread::spawn(move || {
                    writer.write(&path, &vec![i; 4096], DOCUMENT_MODE).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let bytes = writer.read(&path).unwrap();
        assert_eq!(bytes.len(), 4096);
        assert!(bytes.iter().all(|b| *b == bytes[0]));
        assert!(temp_files(dir.path()).is_empty());
    }
}
