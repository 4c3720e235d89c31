use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::drift::Severity;
use super::timestamp;

/// Lightweight listing record for a stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub resource_count: usize,
    pub file_path: PathBuf,
    pub file_size: u64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Lightweight listing record for a stored baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub snapshot_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Lightweight listing record for a stored drift report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReportInfo {
    pub id: String,
    pub baseline_id: String,
    pub current_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub change_count: usize,
    pub overall_risk: Severity,
    pub file_path: PathBuf,
    pub file_size: u64,
}

/// Human readable byte count (`512 B`, `1.5 KiB`, `2.0 MiB`)
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
