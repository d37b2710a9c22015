//! Result cache for vibe-gateway
//!
//! Analysis results are stored under a fingerprint of the normalized request
//! parameters. Expiry is checked lazily on read; `delete_expired` is an
//! explicit maintenance sweep.

pub mod entry;
pub mod key;
pub mod memory;
pub mod service;
pub mod storage;

pub use entry::CacheEntry;
pub use key::{
    is_fingerprint, short_key, text_digest, CacheKeyGenerator, CacheKeyParams, CACHE_VERSION, FINGERPRINT_LEN,
    SHORT_KEY_LEN,
};
pub use memory::MemoryRepository;
pub use service::{CacheOutcome, CacheService, CacheServiceStats};
pub use storage::FileRepository;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by cache repositories.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt cache entry {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid cache key '{0}': expected a 64-character lowercase hex fingerprint")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Entry counts, total and per source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStats {
    pub total_entries: usize,
    pub by_source: BTreeMap<String, usize>,
}

impl RepositoryStats {
    pub(crate) fn from_sources<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stats = Self::default();
        for source in sources {
            stats.total_entries += 1;
            *stats.by_source.entry(source.to_string()).or_insert(0) += 1;
        }
        stats
    }
}

/// Storage backend for cached results.
///
/// Implementations serialize their own state transitions; callers never lock
/// around them. An expired entry reads as a miss even before it is swept.
pub trait CacheRepository: Send + Sync {
    /// Fetch a live entry.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Fetch only the stored value of a live entry.
    fn get_result(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.get(key)?.map(|entry| entry.value))
    }

    /// Store `value` for `key`, replacing any previous entry.
    fn set(&self, key: &str, source: &str, value: serde_json::Value, ttl: Duration) -> Result<()>;

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove one entry; returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry written by `source`.
    fn clear_by_source(&self, source: &str) -> Result<usize>;

    /// Remove every entry.
    fn clear(&self) -> Result<usize>;

    /// Sweep expired entries.
    fn delete_expired(&self) -> Result<usize>;

    /// Number of stored entries, expired ones included until swept.
    fn size(&self) -> Result<usize>;

    fn stats(&self) -> Result<RepositoryStats>;
}
