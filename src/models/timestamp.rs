//! Timestamp codec for store documents
//!
//! Accepts RFC3339 (with or without fractional seconds) and the plain
//! `YYYY-MM-DD HH:MM:SS` layout, which is read as UTC. Always emits RFC3339
//! with nanosecond precision and a `Z` suffix.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const PLAIN_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp in any accepted layout
pub fn parse(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(input, PLAIN_LAYOUT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Render a timestamp in the canonical emitted layout
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Render a timestamp for use inside a file name (colons become dashes)
pub fn file_stamp(ts: &DateTime<Utc>) -> String {
    let secs = if ts.timestamp_subsec_nanos() == 0 {
        ts.to_rfc3339_opts(SecondsFormat::Secs, true)
    } else {
        ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
    };
    secs.replace(':', "-")
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Same codec for optional timestamps
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_some(&super::format(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
        }
    }
}
