//! In-Memory Adapter
//!
//! Process-local cache backed by a HashMap behind a single RwLock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{is_valid_key, CacheAdapter, CacheEntry, Clock, SystemClock};
use crate::config::{InMemoryCacheConfig, ResolvedInMemoryConfig};
use crate::error::{CacheError, Result};

// == In-Memory Cache ==
/// Cache whose namespace lives as long as the instance.
#[derive(Debug)]
pub struct InMemoryCache {
    /// Key-value storage with write timestamps
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// TTL applied to every entry
    expires_in: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryCache {
    // == Constructor ==
    /// Creates an empty cache using the system clock.
    ///
    /// # Arguments
    /// * `config` - TTL; zero or negative selects the one hour default
    pub fn new(config: InMemoryCacheConfig) -> Self {
        Self::from_resolved(config.resolve(), Arc::new(SystemClock))
    }

    /// Creates an empty cache that reads time from `clock`.
    pub fn with_clock(config: InMemoryCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_resolved(config.resolve(), clock)
    }

    /// Creates an empty cache from already normalized settings.
    ///
    /// # Arguments
    /// * `config` - Settings with a positive TTL
    /// * `clock` - Time source for entry timestamps and expiry checks
    pub fn from_resolved(config: ResolvedInMemoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expires_in: config.expires_in(),
            clock,
        }
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    // == Length ==
    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheAdapter for InMemoryCache {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let entry = CacheEntry::new(value, self.clock.now());
        self.entries.write().await.insert(key.to_string(), entry);

        debug!(key, "memory cache set");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let entries = self.entries.read().await;
        let now = self.clock.now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(self.expires_in, now) => {
                debug!(key, age_ms = entry.age(now).num_milliseconds(), "memory cache entry expired");
                Err(CacheError::Expired(key.to_string()))
            }
            Some(entry) => Ok(entry.value.clone()),
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    async fn is_valid(&self, key: &str) -> bool {
        if !is_valid_key(key) {
            return false;
        }

        let entries = self.entries.read().await;
        entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.expires_in, self.clock.now()))
    }

    async fn clear(&self, key: &str) -> Result<()> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let removed = self.entries.write().await.remove(key).is_some();
        debug!(key, removed, "memory cache clear");
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));

        debug!(prefix, removed = before - entries.len(), "memory cache clear_prefix");
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();

        debug!(removed, "memory cache clear_all");
        Ok(())
    }
}
