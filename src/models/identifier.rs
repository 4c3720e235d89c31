//! Identifier syntax shared by snapshots, baselines and drift reports
//!
//! A valid identifier is non-empty, at most 255 bytes, free of control bytes,
//! path separators and `..`, and is not a reserved Windows device name.

use crate::constants::MAX_IDENTIFIER_LEN;
use crate::error::{Error, Result};

const RESERVED_NAMES: &[&str] = &["CON", "PRN", "AUX", "NUL"];

/// Validate an identifier, describing the first rule it breaks
pub fn validate_identifier(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::validation("identifier must not be empty"));
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::validation(format!(
            "identifier is {} bytes, maximum is {}",
            id.len(),
            MAX_IDENTIFIER_LEN
        )));
    }
    if let Some(byte) = id.bytes().find(|b| *b < 0x20 || *b == 0x7f) {
        return Err(Error::validation(format!(
            "identifier contains control byte 0x{:02x}",
            byte
        )));
    }
    if id.contains('/') || id.contains('\\') {
        return Err(Error::validation(format!(
            "identifier '{}' contains a path separator",
            id
        )));
    }
    if id.contains("..") {
        return Err(Error::validation(format!("identifier '{}' contains '..'", id)));
    }
    if is_reserved_name(id) {
        return Err(Error::validation(format!(
            "identifier '{}' is a reserved device name",
            id
        )));
    }
    Ok(())
}

/// Whether the identifier is a reserved Windows device name (case-insensitive)
pub fn is_reserved_name(id: &str) -> bool {
    let upper = id.to_ascii_uppercase();
    if RESERVED_NAMES.contains(&upper.as_str()) {
        return true;
    }
    for prefix in ["COM", "LPT"] {
        if let Some(digit) = upper.strip_prefix(prefix) {
            if digit.len() == 1 && matches!(digit.as_bytes()[0], b'1'..=b'9') {
                return true;
            }
        }
    }
    false
}
