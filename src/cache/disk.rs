//! Disk Adapter
//!
//! Persists each entry as `<directory>/<key>.json`. The directory is created
//! lazily and survives process restarts; two instances pointed at the same
//! directory share files but are not coordinated with each other.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{is_valid_key, CacheAdapter, CacheEntry, Clock, SystemClock, ENTRY_FILE_SUFFIX};
use crate::config::{DiskCacheConfig, ResolvedDiskConfig};
use crate::error::{BackendFailure, CacheError, Result};

// == Disk Cache ==
/// File-per-key cache rooted at an absolute directory.
///
/// `clear_prefix` walks the directory recursively and `clear_all` deletes the
/// whole directory tree, so the directory must not hold unrelated data.
#[derive(Debug)]
pub struct DiskCache {
    directory: PathBuf,
    expires_in: Duration,
    clock: Arc<dyn Clock>,
    /// Serializes writers against readers within this instance
    lock: RwLock<()>,
}

impl DiskCache {
    // == Constructor ==
    /// Resolves `config` and creates the adapter using the system clock.
    ///
    /// The directory is not touched here; it is created by the first operation
    /// that writes to it.
    ///
    /// # Arguments
    /// * `config` - Directory and TTL; an unset directory means the working directory
    ///
    /// # Returns
    /// The adapter, or a backend failure if the working directory cannot be read.
    pub fn new(config: DiskCacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`DiskCache::new`], reading time from `clock`.
    pub fn with_clock(config: DiskCacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::from_resolved(config.resolve()?, clock))
    }

    /// Creates the adapter from already normalized settings.
    ///
    /// # Arguments
    /// * `config` - Absolute directory and positive TTL
    /// * `clock` - Time source for entry timestamps and expiry checks
    pub fn from_resolved(config: ResolvedDiskConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: config.directory().to_path_buf(),
            expires_in: config.expires_in(),
            clock,
            lock: RwLock::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Path of the file holding `key`'s entry.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}{ENTRY_FILE_SUFFIX}"))
    }

    async fn ensure_directory(&self) -> Result<()> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| BackendFailure::io(&self.directory, e).into())
    }

    async fn read_entry(&self, key: &str) -> Result<CacheEntry> {
        let path = self.entry_path(key);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound(key.to_string()));
            }
            Err(e) => return Err(BackendFailure::io(path, e).into()),
        };

        serde_json::from_slice(&data)
            .map_err(|source| BackendFailure::Serialization { path, source }.into())
    }
}

#[async_trait]
impl CacheAdapter for DiskCache {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let _guard = self.lock.write().await;
        self.ensure_directory().await?;

        let path = self.entry_path(key);
        let entry = CacheEntry::new(value, self.clock.now());
        let data = serde_json::to_vec(&entry).map_err(|source| BackendFailure::Serialization {
            path: path.clone(),
            source,
        })?;

        fs::write(&path, data)
            .await
            .map_err(|e| BackendFailure::io(&path, e))?;

        debug!(key, path = %path.display(), "disk cache set");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let _guard = self.lock.read().await;
        let entry = self.read_entry(key).await?;
        let now = self.clock.now();

        // The file is kept; only an explicit clear removes it
        if entry.is_expired(self.expires_in, now) {
            debug!(key, age_ms = entry.age(now).num_milliseconds(), "disk cache entry expired");
            return Err(CacheError::Expired(key.to_string()));
        }

        Ok(entry.value)
    }

    async fn is_valid(&self, key: &str) -> bool {
        if !is_valid_key(key) {
            return false;
        }

        let _guard = self.lock.read().await;
        match self.read_entry(key).await {
            Ok(entry) => !entry.is_expired(self.expires_in, self.clock.now()),
            Err(e) => {
                if e.is_backend() {
                    debug!(key, error = %e, "disk cache entry unreadable");
                }
                false
            }
        }
    }

    async fn clear(&self, key: &str) -> Result<()> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let _guard = self.lock.write().await;
        let path = self.entry_path(key);

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "disk cache clear");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendFailure::io(path, e).into()),
        }
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        self.ensure_directory().await?;

        let (removed, failures) = sweep(&self.directory, prefix).await;
        info!(prefix, removed, failed = failures.len(), "disk cache clear_prefix");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BackendFailure::Sweep { failures }.into())
        }
    }

    async fn clear_all(&self) -> Result<()> {
        let _guard = self.lock.write().await;

        match fs::remove_dir_all(&self.directory).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(BackendFailure::io(&self.directory, e).into()),
        }

        // Recreating the root is best-effort; `set` creates it again on demand
        if let Err(e) = self.ensure_directory().await {
            warn!(error = %e, "cannot recreate cache directory");
        }

        info!(directory = %self.directory.display(), "disk cache clear_all");
        Ok(())
    }
}

fn is_entry_file(file_name: &str, prefix: &str) -> bool {
    file_name.starts_with(prefix) && file_name.ends_with(ENTRY_FILE_SUFFIX)
}

/// Removes every entry file under `root` (recursively) whose name starts with
/// `prefix`. Returns the number removed and every failure met on the way.
async fn sweep(root: &Path, prefix: &str) -> (usize, Vec<BackendFailure>) {
    let mut removed = 0;
    let mut failures = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                failures.push(BackendFailure::io(&dir, e));
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    failures.push(BackendFailure::io(&dir, e));
                    break;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    failures.push(BackendFailure::io(&path, e));
                    continue;
                }
            };

            // Symlinks are not followed
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }

            if !is_entry_file(&entry.file_name().to_string_lossy(), prefix) {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed cache file");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => failures.push(BackendFailure::io(&path, e)),
            }
        }
    }

    (removed, failures)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use tempfile::TempDir;

    fn create_cache(dir: &Path, ttl_secs: i64) -> (DiskCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = DiskCache::with_clock(
            DiskCacheConfig::new(dir, Duration::seconds(ttl_secs)),
            clock.clone(),
        )
        .unwrap();
        (cache, clock)
    }

    #[test]
    fn test_is_entry_file() {
        assert!(is_entry_file("ab1.json", "ab"));
        assert!(is_entry_file("ab.json", ""));
        assert!(!is_entry_file("ab1.txt", "ab"));
        assert!(!is_entry_file("xab.json", "ab"));
    }

    #[test]
    fn test_entry_path() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);

        assert_eq!(cache.entry_path("foo"), temp.path().join("foo.json"));
    }

    #[tokio::test]
    async fn test_disk_directory_created_lazily() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("cache");
        let (cache, _) = create_cache(&dir, 10);

        assert!(!dir.exists());
        assert!(matches!(cache.get("foo").await, Err(CacheError::NotFound(_))));
        assert!(!dir.exists());

        cache.set("foo", "bar").await.unwrap();
        assert!(dir.join("foo.json").is_file());
    }

    #[tokio::test]
    async fn test_disk_set_and_get() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);

        cache.set("key1", "value1").await.unwrap();

        assert_eq!(cache.get("key1").await.unwrap(), "value1");
        assert!(cache.is_valid("key1").await);
    }

    #[tokio::test]
    async fn test_disk_file_content() {
        let temp = TempDir::new().unwrap();
        let (cache, clock) = create_cache(temp.path(), 10);

        cache.set("foo", "bar").await.unwrap();

        let text = std::fs::read_to_string(temp.path().join("foo.json")).unwrap();
        let entry: CacheEntry = serde_json::from_str(&text).unwrap();
        assert_eq!(entry.value, "bar");
        assert_eq!(entry.created_at, clock.now());

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(json.get("created_at").is_some());
    }

    #[tokio::test]
    async fn test_disk_overwrite_truncates() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);

        cache.set("key1", &"x".repeat(1024)).await.unwrap();
        cache.set("key1", "short").await.unwrap();

        assert_eq!(cache.get("key1").await.unwrap(), "short");
    }

    #[tokio::test]
    async fn test_disk_value_preserved_exactly() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);
        let value = "line1\nline2\t\"quoted\" ünïcødé \u{0}";

        cache.set("key1", value).await.unwrap();
        assert_eq!(cache.get("key1").await.unwrap(), value);

        cache.set("empty", "").await.unwrap();
        assert_eq!(cache.get("empty").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_disk_expired_keeps_file() {
        let temp = TempDir::new().unwrap();
        let (cache, clock) = create_cache(temp.path(), 10);

        cache.set("foo", "bar").await.unwrap();
        clock.advance(Duration::seconds(10));
        assert!(cache.is_valid("foo").await);

        clock.advance(Duration::seconds(1));
        assert!(!cache.is_valid("foo").await);
        assert!(matches!(cache.get("foo").await, Err(CacheError::Expired(_))));
        assert!(temp.path().join("foo.json").is_file());
    }

    #[tokio::test]
    async fn test_disk_malformed_entry() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);
        std::fs::write(temp.path().join("broken.json"), b"{not json").unwrap();

        let err = cache.get("broken").await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Backend(BackendFailure::Serialization { .. })
        ));
        assert!(!cache.is_valid("broken").await);
    }

    #[tokio::test]
    async fn test_disk_reads_entry_with_offset_timestamp() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::parse_from_rfc3339("2024-01-01T10:00:05Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
        ));
        let cache = DiskCache::with_clock(
            DiskCacheConfig::new(temp.path(), Duration::seconds(10)),
            clock,
        )
        .unwrap();
        std::fs::write(
            temp.path().join("legacy.json"),
            r#"{"created_at":"2024-01-01T12:00:00.123456789+02:00","value":"old"}"#,
        )
        .unwrap();

        assert_eq!(cache.get("legacy").await.unwrap(), "old");
    }

    #[tokio::test]
    async fn test_disk_clear() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);

        cache.set("key1", "value1").await.unwrap();
        cache.clear("key1").await.unwrap();

        assert!(!temp.path().join("key1.json").exists());
        assert!(matches!(cache.get("key1").await, Err(CacheError::NotFound(_))));

        // Absent key is a silent no-op
        cache.clear("key1").await.unwrap();
    }

    #[tokio::test]
    async fn test_disk_invalid_key_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cache");
        let (cache, _) = create_cache(&dir, 10);

        assert!(matches!(cache.set("../escape", "v").await, Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.get("a b").await, Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.clear("a b").await, Err(CacheError::InvalidKey(_))));
        assert!(!cache.is_valid("a b").await);

        assert!(!dir.exists());
        assert!(!temp.path().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_disk_clear_prefix() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);

        for key in ["ab1", "ab2", "xy1"] {
            cache.set(key, "v").await.unwrap();
        }
        cache.clear_prefix("ab").await.unwrap();

        assert!(!temp.path().join("ab1.json").exists());
        assert!(!temp.path().join("ab2.json").exists());
        assert!(cache.is_valid("xy1").await);
    }

    #[tokio::test]
    async fn test_disk_clear_prefix_walks_subdirectories() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);
        let sub = temp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("ab_nested.json"), b"{}").unwrap();
        std::fs::write(temp.path().join("ab_notes.txt"), b"keep").unwrap();

        cache.clear_prefix("ab").await.unwrap();

        assert!(!sub.join("ab_nested.json").exists());
        assert!(sub.is_dir());
        assert!(temp.path().join("ab_notes.txt").exists());
    }

    #[tokio::test]
    async fn test_disk_clear_all() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cache");
        let (cache, _) = create_cache(&dir, 10);

        cache.set("key1", "value1").await.unwrap();
        cache.set("key2", "value2").await.unwrap();
        cache.clear_all().await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        assert!(!cache.is_valid("key1").await);
    }

    #[tokio::test]
    async fn test_disk_clear_all_missing_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("never_written");
        let (cache, _) = create_cache(&dir, 10);

        cache.clear_all().await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_disk_directory_is_a_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let (cache, _) = create_cache(&blocker, 10);

        assert!(cache.set("foo", "bar").await.unwrap_err().is_backend());
        assert!(cache.clear_prefix("f").await.unwrap_err().is_backend());
        assert!(!cache.is_valid("foo").await);
    }

    #[tokio::test]
    async fn test_disk_clear_reports_removal_failure() {
        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);
        std::fs::create_dir(temp.path().join("key1.json")).unwrap();

        let err = cache.clear("key1").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(BackendFailure::Io { .. })));
        assert!(temp.path().join("key1.json").is_dir());
    }

    #[tokio::test]
    async fn test_sweep_collects_unreadable_root() {
        let temp = TempDir::new().unwrap();
        let not_a_dir = temp.path().join("plain_file");
        std::fs::write(&not_a_dir, b"x").unwrap();

        let (removed, failures) = sweep(&not_a_dir, "ab").await;

        assert_eq!(removed, 0);
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], BackendFailure::Io { path, .. } if path == &not_a_dir));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_disk_clear_prefix_continues_past_failure() {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let temp = TempDir::new().unwrap();
        let (cache, _) = create_cache(temp.path(), 10);
        cache.set("ab1", "v").await.unwrap();

        // Permission bits do not stop root from reading a directory
        if std::fs::metadata(temp.path().join("ab1.json")).unwrap().uid() == 0 {
            return;
        }

        let readable = temp.path().join("readable");
        let locked = temp.path().join("locked");
        std::fs::create_dir(&readable).unwrap();
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(readable.join("ab2.json"), b"{}").unwrap();
        std::fs::write(locked.join("ab3.json"), b"{}").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let result = cache.clear_prefix("ab").await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        match result {
            Err(CacheError::Backend(BackendFailure::Sweep { failures })) => {
                assert_eq!(failures.len(), 1);
            }
            other => panic!("expected sweep failure, got {other:?}"),
        }
        assert!(!temp.path().join("ab1.json").exists());
        assert!(!readable.join("ab2.json").exists());
        assert!(locked.join("ab3.json").exists());
    }
}
