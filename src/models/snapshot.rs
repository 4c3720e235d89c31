use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::identifier::validate_identifier;
use super::resource::Resource;
use super::timestamp;
use crate::error::{Error, Result};

/// Point-in-time inventory of resources from one provider.
///
/// Field order matters: the header fields are serialised before the
/// resource array so a partial read of the document can list it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Collection details recorded alongside a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default)]
    pub collector_version: String,
    /// Wall-clock collection time in milliseconds
    #[serde(default)]
    pub collection_duration_ms: u64,
    #[serde(default)]
    pub resource_count: usize,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            provider: provider.into(),
            metadata: SnapshotMetadata::default(),
            resources: Vec::new(),
        }
    }

    /// Replace the resource list and refresh the recorded count
    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self.refresh_metadata();
        self
    }

    pub fn refresh_metadata(&mut self) {
        self.metadata.resource_count = self.resources.len();
    }

    /// Validate identifier syntax, required fields and resource uniqueness
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.id)
            .map_err(|e| Error::validation(format!("snapshot id: {}", e)))?;
        if self.provider.trim().is_empty() {
            return Err(Error::validation(format!("snapshot {} has no provider", self.id)));
        }

        let mut ids = HashSet::with_capacity(self.resources.len());
        let mut keys = HashSet::with_capacity(self.resources.len());
        for resource in &self.resources {
            resource
                .validate()
                .map_err(|e| Error::validation(format!("snapshot {}: {}", self.id, e)))?;
            if !ids.insert(resource.id.as_str()) {
                return Err(Error::validation(format!(
                    "snapshot {} has duplicate resource id {}",
                    self.id, resource.id
                )));
            }
            if !keys.insert((resource.resource_type.as_str(), resource.id.as_str())) {
                return Err(Error::validation(format!(
                    "snapshot {} has duplicate resource key {}/{}",
                    self.id, resource.resource_type, resource.id
                )));
            }
        }
        Ok(())
    }

    /// Resource counts per type, sorted by type
    pub fn resources_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.resource_type.clone()).or_insert(0) += 1;
        }
        counts
    }
}
