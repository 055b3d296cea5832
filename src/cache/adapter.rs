//! Adapter Contract
//!
//! The interface every cache backend implements. Callers hold an
//! `Arc<dyn CacheAdapter>` and never depend on a concrete backend.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value cache with per-instance TTL and key/prefix/whole-namespace
/// invalidation.
///
/// Every method completes its work before returning. Mutating calls are
/// exclusive per instance; `get` and `is_valid` may run concurrently.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Stores `value` under `key`, replacing any previous entry and resetting
    /// its creation time.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns the value stored under `key`.
    ///
    /// Fails with `InvalidKey`, `NotFound`, `Expired`, or a backend failure.
    async fn get(&self, key: &str) -> Result<String>;

    /// Returns true only if `key` is valid, present, readable and unexpired.
    async fn is_valid(&self, key: &str) -> bool;

    /// Removes the entry under `key`. Clearing an absent key succeeds.
    async fn clear(&self, key: &str) -> Result<()>;

    /// Removes every entry whose key starts with `prefix`.
    async fn clear_prefix(&self, prefix: &str) -> Result<()>;

    /// Removes every entry in the namespace.
    async fn clear_all(&self) -> Result<()>;
}
