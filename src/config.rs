//! Configuration Module
//!
//! Raw adapter configuration plus the normalization step that turns it into
//! fully resolved settings. Defaults are applied once, at construction, never
//! inside cache operations.

use std::env;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{BackendFailure, Result};

/// TTL substituted when a caller supplies a non-positive `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Returns the TTL an adapter will actually use.
///
/// # Arguments
/// * `expires_in` - TTL requested by the caller
///
/// # Returns
/// - `expires_in` unchanged if it is positive
/// - [`DEFAULT_EXPIRES_IN_SECS`] seconds otherwise
pub fn normalize_expires_in(expires_in: Duration) -> Duration {
    if expires_in <= Duration::zero() {
        Duration::seconds(DEFAULT_EXPIRES_IN_SECS)
    } else {
        expires_in
    }
}

// == In-Memory Config ==
/// Options recognized by the in-memory adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryCacheConfig {
    /// Entry TTL; non-positive means the one hour default
    #[serde(rename = "expires_in_ms", with = "duration_ms", default)]
    pub expires_in: Duration,
}

impl InMemoryCacheConfig {
    /// Creates a config with the given TTL.
    ///
    /// # Arguments
    /// * `expires_in` - Entry TTL; zero or negative selects the default
    pub fn new(expires_in: Duration) -> Self {
        Self { expires_in }
    }

    /// Applies defaults and returns the settings the adapter runs with.
    ///
    /// # Returns
    /// Settings whose TTL is always positive.
    pub fn resolve(self) -> ResolvedInMemoryConfig {
        ResolvedInMemoryConfig {
            expires_in: normalize_expires_in(self.expires_in),
        }
    }
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            expires_in: Duration::zero(),
        }
    }
}

/// Normalized in-memory settings: the TTL is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedInMemoryConfig {
    expires_in: Duration,
}

impl ResolvedInMemoryConfig {
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }
}

// == Disk Config ==
/// Options recognized by the disk adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCacheConfig {
    /// Cache directory; `None` or empty means the current working directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Entry TTL; non-positive means the one hour default
    #[serde(rename = "expires_in_ms", with = "duration_ms", default)]
    pub expires_in: Duration,
}

impl DiskCacheConfig {
    /// Creates a config for `directory` with the given TTL.
    ///
    /// # Arguments
    /// * `directory` - Cache directory, absolute or relative to the working directory
    /// * `expires_in` - Entry TTL; zero or negative selects the default
    pub fn new(directory: impl Into<PathBuf>, expires_in: Duration) -> Self {
        Self {
            directory: Some(directory.into()),
            expires_in,
        }
    }

    /// Resolves the directory to an absolute path and applies the TTL default.
    ///
    /// Only the working directory is consulted; the cache directory itself is
    /// created lazily by the adapter.
    ///
    /// # Returns
    /// - Settings with an absolute directory and a positive TTL
    /// - A backend failure if the working directory cannot be read
    pub fn resolve(self) -> Result<ResolvedDiskConfig> {
        let directory = match self.directory {
            Some(dir) if !dir.as_os_str().is_empty() => absolutize(&dir)?,
            _ => current_dir()?,
        };

        Ok(ResolvedDiskConfig {
            directory,
            expires_in: normalize_expires_in(self.expires_in),
        })
    }
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            expires_in: Duration::zero(),
        }
    }
}

/// Normalized disk settings: absolute directory and positive TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDiskConfig {
    directory: PathBuf,
    expires_in: Duration,
}

impl ResolvedDiskConfig {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }
}

// == Backend Selection ==
/// Backend choice for [`crate::build_cache`], e.g. `{"backend": "disk", "directory": "/var/cache/app"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CacheConfig {
    Memory(InMemoryCacheConfig),
    Disk(DiskCacheConfig),
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Memory(InMemoryCacheConfig::default())
    }
}

fn current_dir() -> Result<PathBuf> {
    env::current_dir().map_err(|e| BackendFailure::io(".", e).into())
}

fn absolutize(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(current_dir()?.join(dir))
    }
}

/// TTL as whole milliseconds. A positive TTL is rounded up so it never
/// collapses to zero and picks up the default on the way back in.
mod duration_ms {
    use chrono::Duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = value.num_milliseconds();
        let millis = if *value > Duration::milliseconds(millis) {
            millis.saturating_add(1)
        } else {
            millis
        };
        serializer.serialize_i64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Duration::try_milliseconds(millis)
            .ok_or_else(|| D::Error::custom(format!("expires_in_ms out of range: {millis}")))
    }
}
