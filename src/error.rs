//! Error types for the cache adapters
//!
//! Provides unified error handling using thiserror.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type shared by every cache adapter.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key contains characters outside `[A-Za-z0-9_]` or is empty
    #[error("Invalid cache key {0:?}: keys may only contain [A-Za-z0-9_]")]
    InvalidKey(String),

    /// No entry stored under the key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Entry exists but its TTL has elapsed
    #[error("Key expired: {0}")]
    Expired(String),

    /// Storage backend failed
    #[error(transparent)]
    Backend(#[from] BackendFailure),
}

impl CacheError {
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, CacheError::InvalidKey(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, CacheError::Expired(_))
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, CacheError::Backend(_))
    }
}

// == Backend Failure ==
/// Underlying cause of a [`CacheError::Backend`].
#[derive(Error, Debug)]
pub enum BackendFailure {
    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Entry file could not be encoded or decoded
    #[error("Malformed cache entry {}: {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// One or more removals failed during a bulk sweep
    #[error("Cache sweep failed for {} path(s): {}", .failures.len(), summarize(.failures))]
    Sweep { failures: Vec<BackendFailure> },
}

impl BackendFailure {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BackendFailure::Io {
            path: path.into(),
            source,
        }
    }
}

fn summarize(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
