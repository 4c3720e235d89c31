use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::identifier::validate_identifier;
use super::timestamp;
use crate::error::{Error, Result};

/// Named designation of a snapshot against which drift is measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
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
    /// Set on load when the referenced snapshot no longer exists
    #[serde(skip)]
    pub dangling: bool,
}

impl Baseline {
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.id)
            .map_err(|e| Error::validation(format!("baseline id: {}", e)))?;
        if self.name.trim().is_empty() {
            return Err(Error::validation(format!("baseline {} has no name", self.id)));
        }
        validate_identifier(&self.snapshot_id)
            .map_err(|e| Error::validation(format!("baseline {} snapshot id: {}", self.id, e)))
    }
}
