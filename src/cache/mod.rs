//! Cache Module
//!
//! The adapter contract, its two backends, and the key and expiry rules they
//! share.

mod adapter;
mod clock;
mod disk;
mod entry;
mod key;
mod memory;


// Re-export public types
pub use adapter::CacheAdapter;
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use disk::DiskCache;
pub use entry::{is_expired, CacheEntry};
pub use key::is_valid_key;
pub use memory::InMemoryCache;

// == Public Constants ==
/// File name suffix of disk cache entries
pub const ENTRY_FILE_SUFFIX: &str = ".json";
