//! File-backed cache repository

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;

use crate::entry::CacheEntry;
use crate::key::{is_fingerprint, short_key, CACHE_VERSION};
use crate::{CacheError, CacheRepository, RepositoryStats, Result};

/// Repository storing one JSON file per entry.
///
/// Layout: `cache_dir/ab/abc123....json`, the first two characters of the
/// fingerprint forming a subdirectory. Writes go to a temporary file that is
/// renamed into place, so a reader never sees a partial entry.
#[derive(Debug)]
pub struct FileRepository {
    cache_dir: PathBuf,
    max_size: usize,
    lock: Mutex<()>,
}

impl FileRepository {
    /// Create a repository rooted at `cache_dir`, creating it if needed.
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        Ok(Self {
            cache_dir,
            max_size: 0,
            lock: Mutex::new(()),
        })
    }

    /// Bound the number of entries; `0` means unbounded.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Path of the entry file; keys must be fingerprints so they stay inside `cache_dir`.
    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if !is_fingerprint(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.cache_dir.join(&key[..2]).join(format!("{}.json", key)))
    }

    fn read_entry(path: &Path) -> Result<Option<CacheEntry>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn remove_file(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn entry_files(&self) -> impl Iterator<Item = PathBuf> {
        walkdir::WalkDir::new(&self.cache_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "json"))
            .map(|e| e.into_path())
    }

    /// Every readable entry with its path. Corrupt files are skipped.
    fn load_all(&self) -> Vec<(PathBuf, CacheEntry)> {
        self.entry_files()
            .filter_map(|path| match Self::read_entry(&path) {
                Ok(Some(entry)) => Some((path, entry)),
                Ok(None) => None,
                Err(e) => {
                    log::warn!("Skipping unreadable cache file: {}", e);
                    None
                }
            })
            .collect()
    }

    fn remove_where<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let mut removed = 0;
        for (path, entry) in self.load_all() {
            if predicate(&entry) && Self::remove_file(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn make_room(&self, key: &str) -> Result<()> {
        if self.max_size == 0 || self.entry_path(key)?.exists() {
            return Ok(());
        }
        if self.entry_files().count() < self.max_size {
            return Ok(());
        }

        let now = Utc::now();
        let swept = self.remove_where(|entry| entry.is_expired_at(now))?;
        if swept > 0 {
            log::debug!("Swept {} expired cache entries to make room", swept);
        }

        let mut entries = self.load_all();
        if entries.len() < self.max_size {
            return Ok(());
        }

        entries.sort_by_key(|(_, entry)| entry.created_at);
        let excess = entries.len() + 1 - self.max_size;
        for (path, entry) in entries.into_iter().take(excess) {
            log::debug!("Evicting cache entry: {}", short_key(&entry.key));
            Self::remove_file(&path)?;
        }
        Ok(())
    }
}

impl CacheRepository for FileRepository {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entry = Self::read_entry(&self.entry_path(key)?)?;
        Ok(entry.filter(|entry| !entry.is_expired()))
    }

    fn set(&self, key: &str, source: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        let path = self.entry_path(key)?;
        let entry = CacheEntry::new(CACHE_VERSION, key, source, value, ttl);
        let content = serde_json::to_string_pretty(&entry)?;

        let _guard = self.guard();
        self.make_room(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::debug!("Cache entry saved: {}", path.display());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key)?;
        let _guard = self.guard();
        let removed = Self::remove_file(&path)?;
        if removed {
            log::debug!("Cache entry deleted: {}", short_key(key));
        }
        Ok(removed)
    }

    fn clear_by_source(&self, source: &str) -> Result<usize> {
        let _guard = self.guard();
        self.remove_where(|entry| entry.source == source)
    }

    fn clear(&self) -> Result<usize> {
        let _guard = self.guard();
        let mut removed = 0;
        for path in self.entry_files() {
            if Self::remove_file(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn delete_expired(&self) -> Result<usize> {
        let _guard = self.guard();
        let now = Utc::now();
        self.remove_where(|entry| entry.is_expired_at(now))
    }

    fn size(&self) -> Result<usize> {
        Ok(self.entry_files().count())
    }

    fn stats(&self) -> Result<RepositoryStats> {
        let entries = self.load_all();
        Ok(RepositoryStats::from_sources(
            entries.iter().map(|(_, entry)| entry.source.as_str()),
        ))
    }
}
