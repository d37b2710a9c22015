//! In-process cache repository.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use crate::entry::CacheEntry;
use crate::key::CACHE_VERSION;
use crate::{CacheRepository, RepositoryStats, Result};

/// Repository holding entries in a map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_size: usize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of entries; `0` means unbounded.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn make_room(&self, entries: &mut HashMap<String, CacheEntry>, key: &str) {
        if self.max_size == 0 || entries.contains_key(key) || entries.len() < self.max_size {
            return;
        }

        let now = Utc::now();
        entries.retain(|_, entry| !entry.is_expired_at(now));

        while entries.len() >= self.max_size {
            let Some(oldest) = entries
                .values()
                .min_by_key(|entry| entry.created_at)
                .map(|entry| entry.key.clone())
            else {
                break;
            };
            log::debug!("Evicting cache entry: {}", crate::short_key(&oldest));
            entries.remove(&oldest);
        }
    }
}

impl CacheRepository for MemoryRepository {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.lock();
        Ok(entries.get(key).filter(|entry| !entry.is_expired()).cloned())
    }

    fn set(&self, key: &str, source: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(CACHE_VERSION, key, source, value, ttl);
        let mut entries = self.lock();
        self.make_room(&mut entries, key);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock().remove(key).is_some())
    }

    fn clear_by_source(&self, source: &str) -> Result<usize> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.source != source);
        Ok(before - entries.len())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    fn delete_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }

    fn size(&self) -> Result<usize> {
        Ok(self.lock().len())
    }

    fn stats(&self) -> Result<RepositoryStats> {
        let entries = self.lock();
        Ok(RepositoryStats::from_sources(
            entries.values().map(|entry| entry.source.as_str()),
        ))
    }
}
