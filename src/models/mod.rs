//! Data models module
//!
//! Defines core data structures:
//! - Resource: single inventory item with configuration, tags and metadata
//! - Snapshot: resources collected from one provider at one point in time
//! - Baseline: named reference to a snapshot
//! - DriftReport / ResourceDiff / FieldChange / DriftSummary: differ output
//! - SnapshotInfo / BaselineInfo / DriftReportInfo: listing records
//!
//! Implements the validation rules and the timestamp codec shared by every
//! stored document.

pub mod baseline;
pub mod drift;
pub mod identifier;
pub mod info;
pub mod resource;
pub mod snapshot;
pub mod timestamp;
pub mod value;

pub use baseline::Baseline;
pub use drift::{Category, ChangeType, DriftReport, DriftSummary, FieldChange, ResourceDiff, Severity};
pub use identifier::validate_identifier;
pub use info::{BaselineInfo, DriftReportInfo, SnapshotInfo};
pub use resource::{Resource, ResourceMetadata};
pub use snapshot::{Snapshot, SnapshotMetadata};
