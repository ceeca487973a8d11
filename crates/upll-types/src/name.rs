//! Bounded identifier validation.

use crate::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of a VTN name.
pub const MAX_LEN_VTN_NAME: usize = 31;
/// Maximum length of a vnode (vrouter, vbridge) name.
pub const MAX_LEN_VNODE_NAME: usize = 31;
/// Maximum length of an interface name.
pub const MAX_LEN_INTERFACE_NAME: usize = 31;
/// Maximum length of a flow-list name.
pub const MAX_LEN_FLOWLIST_NAME: usize = 32;
/// Maximum length of a policer (policing profile) name.
pub const MAX_LEN_POLICER_NAME: usize = 32;
/// Maximum length of a controller id.
pub const MAX_LEN_CTRLR_ID: usize = 31;
/// Maximum length of a domain id.
pub const MAX_LEN_DOMAIN_ID: usize = 31;
/// Maximum length of a free-text description.
pub const MAX_LEN_DESCRIPTION: usize = 127;

/// Alphanumeric first character, then alphanumerics and underscores.
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_]*$").expect("Invalid regex pattern"));

/// Validates an identifier field.
///
/// # Errors
///
/// Returns [`ParseError::InvalidName`] if the value is empty, longer than
/// `max_len`, or contains characters outside `[A-Za-z0-9_]` (the first
/// character must be alphanumeric).
///
/// ```
/// use upll_types::{validate_name, MAX_LEN_VTN_NAME};
///
/// assert!(validate_name("vtn_name", "vtn_1", MAX_LEN_VTN_NAME).is_ok());
/// assert!(validate_name("vtn_name", "_vtn", MAX_LEN_VTN_NAME).is_err());
/// ```
pub fn validate_name(field: &'static str, value: &str, max_len: usize) -> Result<(), ParseError> {
    let reason = if value.is_empty() {
        "empty"
    } else if value.len() > max_len {
        "too long"
    } else if !NAME_RE.is_match(value) {
        "illegal character"
    } else {
        return Ok(());
    };
    Err(ParseError::InvalidName {
        field,
        value: value.to_string(),
        reason,
    })
}

/// Validates a free-text description: printable ASCII, bounded length.
pub fn validate_description(field: &'static str, value: &str) -> Result<(), ParseError> {
    if value.len() > MAX_LEN_DESCRIPTION {
        return Err(ParseError::InvalidName {
            field,
            value: value.to_string(),
            reason: "too long",
        });
    }
    if value.chars().any(|c| !(c.is_ascii_graphic() || c == ' ')) {
        return Err(ParseError::InvalidName {
            field,
            value: value.to_string(),
            reason: "illegal character",
        });
    }
    Ok(())
}
