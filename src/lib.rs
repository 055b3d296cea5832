//! Mini Cache - A minimal key-value caching layer
//!
//! One async adapter contract with two interchangeable backends: an in-process
//! map and a file-per-key disk store, both with per-instance TTL and key,
//! prefix and wholesale invalidation.

use std::sync::Arc;

use tracing::debug;

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheAdapter, DiskCache, InMemoryCache};
pub use config::{CacheConfig, DiskCacheConfig, InMemoryCacheConfig};
pub use error::{BackendFailure, CacheError, Result};

/// Builds the adapter selected by `config`.
pub fn build_cache(config: CacheConfig) -> Result<Arc<dyn CacheAdapter>> {
    let adapter: Arc<dyn CacheAdapter> = match config {
        CacheConfig::Memory(config) => Arc::new(InMemoryCache::new(config)),
        CacheConfig::Disk(config) => {
            let cache = DiskCache::new(config)?;
            debug!(directory = %cache.directory().display(), "disk cache configured");
            Arc::new(cache)
        }
    };
    Ok(adapter)
}
