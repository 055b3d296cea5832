//! Key Validation Module
//!
//! Cache keys are restricted to ASCII letters, digits and underscore.

use once_cell::sync::Lazy;
use regex::Regex;

// Anchored: the whole key must match, so a key can never carry a path
// separator or `..` into the disk backend's file name.
static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid cache key regex"));

/// Returns true if `key` is acceptable as a cache key.
pub fn is_valid_key(key: &str) -> bool {
    KEY_PATTERN.is_match(key)
}
