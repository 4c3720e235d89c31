//! File naming and path containment for the store
//!
//! Names are derived from timestamps or sanitized names, and every resolved
//! path is checked to remain under the store's base directory.

use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

use crate::constants::{DRIFT_REPORT_PREFIX, SNAPSHOT_SUFFIX};
use crate::error::{Error, Phase, Result};
use crate::models::timestamp;

/// Replace characters that are unsafe in file names with `-`
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    // Collapse any dot runs so a sanitized name can never climb directories
    let mut collapsed = sanitized;
    while collapsed.contains("..") {
        collapsed = collapsed.replace("..", ".");
    }
    collapsed
}

/// `2024-01-01T00-00-00Z-scan.json`
pub fn snapshot_file_name(ts: &DateTime<Utc>) -> String {
    format!("{}{}", timestamp::file_stamp(ts), SNAPSHOT_SUFFIX)
}

/// Fallback name used when another snapshot already owns the timestamp name
pub fn snapshot_file_name_with_id(ts: &DateTime<Utc>, id: &str) -> String {
    format!("{}-{}{}", timestamp::file_stamp(ts), sanitize_name(id), SNAPSHOT_SUFFIX)
}

/// `<sanitized name>-YYYY-MM-DD.json`
pub fn baseline_file_name(name: &str, created_at: &DateTime<Utc>) -> String {
    format!("{}-{}.json", sanitize_name(name), created_at.format("%Y-%m-%d"))
}

/// `drift-report-2024-01-01T00-00-00Z.json`
pub fn drift_report_file_name(ts: &DateTime<Utc>) -> String {
    format!("{}{}.json", DRIFT_REPORT_PREFIX, timestamp::file_stamp(ts))
}

/// Verify that `path` resolves to a location under `base`.
///
/// The parent directory is canonicalized (it must exist) and the file name
/// must be a plain component.
pub fn ensure_within_base(base: &Path, path: &Path) -> Result<PathBuf> {
    let canonical_base = base
        .canonicalize()
        .map_err(|e| Error::io(Phase::Stat, base, e))?;

    let file_name = match path.components().last() {
        Some(Component::Normal(name)) => name.to_owned(),
        _ => {
            return Err(Error::validation(format!(
                "path {} does not name a file",
                path.display()
            )))
        }
    };
    let parent = path.parent().ok_or_else(|| {
        Error::validation(format!("path {} has no parent directory", path.display()))
    })?;
    let canonical_parent = parent
        .canonicalize()
        .map_err(|e| Error::io(Phase::Stat, parent, e))?;

    if !canonical_parent.starts_with(&canonical_base) {
        return Err(Error::validation(format!(
            "path {} escapes the store directory {}",
            path.display(),
            base.display()
        )));
    }
    Ok(canonical_parent.join(file_name))
}

/// Whether a directory entry is a JSON document the store should consider
pub fn is_document(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "json")
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| !n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("prod baseline"), "prod-baseline");
        assert_eq!(sanitize_name("a/b\\c:d*e?f\"g<h>i|j"), "a-b-c-d-e-f-g-h-i-j");
        assert_eq!(sanitize_name("../../etc"), ".-.-etc");
    }

    #[test]
    fn test_file_names() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(snapshot_file_name(&ts), "2024-01-02T03-04-05Z-scan.json");
        assert_eq!(snapshot_file_name_with_id(&ts, "snap 1"), "2024-01-02T03-04-05Z-snap-1-scan.json");
        assert_eq!(baseline_file_name("prod main", &ts), "prod-main-2024-01-02.json");
        assert_eq!(drift_report_file_name(&ts), "drift-report-2024-01-02T03-04-05Z.json");
    }

    #[test]
    fn test_ensure_within_base() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("store");
        std::fs::create_dir_all(base.join("snapshots")).unwrap();

        let inside = ensure_within_base(&base, &base.join("snapshots").join("a.json")).unwrap();
        assert!(inside.ends_with("snapshots/a.json"));

        let outside = ensure_within_base(&base, &base.join("..").join("a.json"));
        assert!(outside.is_err());

        let dotdot = ensure_within_base(&base, &base.join("snapshots").join(".."));
        assert!(dotdot.is_err());
    }

    #[test]
    fn test_is_document() {
        assert!(is_document(Path::new("/x/2024-scan.json")));
        assert!(!is_document(Path::new("/x/a.json.tmp.1234")));
        assert!(!is_document(Path::new("/x/.hidden.json")));
    }
}
