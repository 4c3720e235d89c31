//! Cheap partial loads used by listings
//!
//! Only the first 4 KiB of a document are read. A map visitor collects the
//! top-level fields until it reaches the heavy array (`resources` or
//! `resource_changes`) and then stops; a truncated trailing value is simply
//! not captured. The typed header is built from whatever was captured.

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeSeed, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::constants::HEADER_READ_SIZE;
use crate::error::{Error, Phase, Result};
use crate::models::{timestamp, Severity};
use super::pool::BufferPool;

const HEAVY_KEYS: &[&str] = &["resources", "resource_changes"];
const STOP_MARKER: &str = "header complete";

/// Header fields of a snapshot document
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotHeader {
    pub id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    #[serde(default)]
    pub metadata: Option<HeaderMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderMetadata {
    #[serde(default)]
    pub resource_count: Option<usize>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Header fields of a baseline document
#[derive(Debug, Clone, Deserialize)]
pub struct BaselineHeader {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub snapshot_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Header fields of a drift report document
#[derive(Debug, Clone, Deserialize)]
pub struct DriftReportHeader {
    pub id: String,
    pub baseline_id: String,
    pub current_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub summary: Option<HeaderSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderSummary {
    #[serde(default)]
    pub changed_resources: usize,
    #[serde(default = "default_risk")]
    pub overall_risk: Severity,
}

fn default_risk() -> Severity {
    Severity::Low
}

/// Read the leading bytes of `path` and decode its header as `T`
pub fn read_header<T: de::DeserializeOwned>(path: &Path, pool: &BufferPool) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::io(Phase::Read, path, e))?;
    let mut buf = pool.get();
    file.take(HEADER_READ_SIZE as u64)
        .read_to_end(&mut buf)
        .map_err(|e| Error::io(Phase::Read, path, e))?;

    let fields = collect_fields(&buf);
    if fields.is_empty() {
        return Err(Error::validation(format!(
            "{} has no readable header",
            path.display()
        )));
    }
    serde_json::from_value(Value::Object(fields)).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect the complete top-level fields that precede the heavy array
pub fn collect_fields(bytes: &[u8]) -> Map<String, Value> {
    let mut fields = Map::new();
    let mut de = serde_json::Deserializer::from_slice(bytes);
    // Stopping early or hitting the truncation point both surface as errors;
    // the fields captured before that point are still valid.
    let _ = HeaderSeed {
        fields: &mut fields,
    }
    .deserialize(&mut de);
    fields
}

struct HeaderSeed<'a> {
    fields: &'a mut Map<String, Value>,
}

impl<'de, 'a> DeserializeSeed<'de> for HeaderSeed<'a> {
    type Value = ();

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, 'a> Visitor<'de> for HeaderSeed<'a> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON document object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        while let Some(key) = map.next_key::<String>()? {
            if HEAVY_KEYS.contains(&key.as_str()) {
                return Err(de::Error::custom(STOP_MARKER));
            }
            let value: Value = map.next_value()?;
            self.fields.insert(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_collect_stops_at_resources() {
        let doc = br#"{"id":"s1","timestamp":"2024-01-01T00:00:00Z","provider":"aws","resources":[{"id":"x"#;
        let fields = collect_fields(doc);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["id"], json!("s1"));
    }

    #[test]
    fn test_truncated_value_is_not_captured() {
        let doc = br#"{"id":"s1","provider":"aws","metadata":{"collector_version":"1.0","resource_co"#;
        let fields = collect_fields(doc);
        assert!(fields.contains_key("provider"));
        assert!(!fields.contains_key("metadata"));
    }

    #[test]
    fn test_read_snapshot_header_from_large_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big-scan.json");
        let resources: Vec<Value> = (0..500)
            .map(|i| json!({"id": format!("i-{}", i), "type": "instance", "provider": "aws", "name": "x".repeat(50)}))
            .collect();
        let doc = json!({
            "id": "snap-big",
            "timestamp": "2024-01-01T00:00:00Z",
            "provider": "aws",
            "metadata": {"collector_version": "1", "resource_count": 500, "tags": {"team": "core"}},
            "resources": resources,
        });
        // serde_json sorts keys, so write the document in header-first order by hand
        let text = format!(
            "{{\"id\":\"snap-big\",\"timestamp\":\"2024-01-01T00:00:00Z\",\"provider\":\"aws\",\"metadata\":{},\"resources\":{}}}",
            doc["metadata"], doc["resources"]
        );
        assert!(text.len() > HEADER_READ_SIZE);
        fs::write(&path, text).unwrap();

        let pool = BufferPool::new(1);
        let header: SnapshotHeader = read_header(&path, &pool).unwrap();
        assert_eq!(header.id, "snap-big");
        let metadata = header.metadata.unwrap();
        assert_eq!(metadata.resource_count, Some(500));
        assert_eq!(metadata.tags.get("team").map(String::as_str), Some("core"));
    }

    #[test]
    fn test_header_without_required_fields_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.json");
        fs::write(&path, b"not json at all").unwrap();
        let pool = BufferPool::new(1);
        assert!(read_header::<SnapshotHeader>(&path, &pool).is_err());

        fs::write(&path, br#"{"name":"only"}"#).unwrap();
        assert!(read_header::<SnapshotHeader>(&path, &pool).is_err());
    }
}
