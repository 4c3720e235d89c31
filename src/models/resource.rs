use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::timestamp;
use crate::error::{Error, Result};

/// A single inventory item collected from a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier, stable within the provider
    pub id: String,
    /// Resource type such as `instance` or `security_group`
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    /// Provider tag (`aws`, `gcp`, `kubernetes`, `terraform`, ...)
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Provider-specific configuration blob
    #[serde(default)]
    pub configuration: BTreeMap<String, Value>,
    #[serde(default)]
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Free-form collection metadata attached to a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Terraform state file the resource was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_data: BTreeMap<String, Value>,
}

impl Resource {
    /// Create a resource with empty configuration, metadata and tags
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            region: None,
            namespace: None,
            configuration: BTreeMap::new(),
            metadata: ResourceMetadata::default(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.configuration.insert(key.into(), value);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Check the fields every resource must carry
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("resource id is required"));
        }
        if self.resource_type.trim().is_empty() {
            return Err(Error::validation(format!("resource {} has no type", self.id)));
        }
        if self.provider.trim().is_empty() {
            return Err(Error::validation(format!("resource {} has no provider", self.id)));
        }
        Ok(())
    }

    /// Key used to match resources across snapshots
    pub fn key(&self) -> (String, String) {
        (self.resource_type.clone(), self.id.clone())
    }

    /// Hex SHA-256 of the resource's canonical JSON
    pub fn content_hash(&self) -> Result<String> {
        // BTreeMap fields serialise in sorted key order, which makes the encoding canonical
        let encoded = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    /// Whether the resource carries a production environment tag
    pub fn is_production(&self) -> bool {
        self.tags.iter().any(|(key, value)| {
            let key = key.to_ascii_lowercase();
            let value = value.to_ascii_lowercase();
            let env_key = matches!(key.as_str(), "env" | "environment" | "stage" | "tier");
            (env_key && matches!(value.as_str(), "prod" | "production"))
                || key == "production"
        })
    }
}
