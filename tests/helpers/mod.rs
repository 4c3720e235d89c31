#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use vaino::models::{Resource, Snapshot};
use vaino::storage::{SnapshotStore, StoreOptions};

/// Temporary store rooted in its own directory
pub struct TestStore {
    pub temp_dir: TempDir,
    pub store: SnapshotStore,
}

impl TestStore {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let store = SnapshotStore::open(temp_dir.path().join("store"), options)?;
        Ok(TestStore { temp_dir, store })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// 2024-01-01T00:00:00Z plus `hours`
pub fn at_hour(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

pub fn instance(id: &str, instance_type: &str) -> Resource {
    Resource::new(id, "instance", format!("web-{}", id), "aws")
        .with_region("us-east-1")
        .with_config("instance_type", json!(instance_type))
        .with_tag("env", "staging")
}

pub fn security_group(id: &str, ingress: &[&str]) -> Resource {
    Resource::new(id, "security_group", format!("sg-{}", id), "aws")
        .with_region("us-east-1")
        .with_config("ingress", json!(ingress))
}

pub fn snapshot(id: &str, hour: i64, resources: Vec<Resource>) -> Snapshot {
    Snapshot::new(id, "aws", at_hour(hour)).with_resources(resources)
}

/// Snapshot with `count` numbered instances
pub fn numbered_snapshot(id: &str, provider: &str, hour: i64, count: usize) -> Snapshot {
    let resources = (0..count)
        .map(|i| {
            Resource::new(format!("i-{:05}", i), "instance", format!("node-{}", i), provider)
                .with_config("instance_type", json!("t3.micro"))
        })
        .collect();
    Snapshot::new(id, provider, at_hour(hour)).with_resources(resources)
}

/// Write `snapshot` as a JSON document under `dir`
pub fn write_snapshot_file(dir: &Path, snapshot: &Snapshot) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!("{}.json", snapshot.id));
    std::fs::write(&path, serde_json::to_vec_pretty(snapshot)?)?;
    Ok(path)
}
