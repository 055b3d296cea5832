//! Cache Entry Module
//!
//! Defines a stored value with its creation timestamp and the expiration
//! policy shared by every backend.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// == Expiration Policy ==
/// Checks whether an entry created at `created_at` is past its TTL at `now`.
///
/// Boundary condition: the comparison is strictly greater-than, so an entry
/// whose age equals the TTL exactly is still valid.
pub fn is_expired(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(created_at) > ttl
}

// == Cache Entry ==
/// A single cached value. This is also the on-disk document of the disk
/// adapter: `{"created_at": "<RFC 3339>", "value": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Write time, set once by `set` and never updated
    pub created_at: DateTime<Utc>,
    /// The stored value
    pub value: String,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with `created_at`.
    pub fn new(value: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            value: value.into(),
        }
    }

    // == Is Expired ==
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        is_expired(self.created_at, ttl, now)
    }

    // == Age ==
    /// Time elapsed since the entry was written.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }
}
