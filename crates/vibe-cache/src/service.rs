//! Cache-aside orchestration with hit/miss accounting.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::key::{short_key, CacheKeyGenerator, CacheKeyParams};
use crate::{CacheRepository, RepositoryStats, Result};

/// Value produced by [`CacheService::get_or_set`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome<T> {
    pub value: T,
    pub from_cache: bool,
}

/// Service counters plus repository statistics when enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheServiceStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryStats>,
}

/// Cache-aside wrapper around a [`CacheRepository`].
///
/// Repository failures never reach the caller: a failed read is a miss and a
/// failed write is logged. When disabled, the repository is never touched.
pub struct CacheService {
    repository: Arc<dyn CacheRepository>,
    keys: CacheKeyGenerator,
    enabled: bool,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheService {
    pub fn new(repository: Arc<dyn CacheRepository>, ttl: Duration) -> Self {
        Self {
            repository,
            keys: CacheKeyGenerator::new(),
            enabled: true,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A service that always computes and never touches `repository`.
    pub fn disabled(repository: Arc<dyn CacheRepository>) -> Self {
        Self {
            enabled: false,
            ..Self::new(repository, Duration::ZERO)
        }
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fingerprint(&self, params: &CacheKeyParams) -> String {
        self.keys.fingerprint(params)
    }

    /// Return the cached value for `params`, or compute and store it.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        params: &CacheKeyParams,
        compute: F,
        ttl: Option<Duration>,
    ) -> std::result::Result<CacheOutcome<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.get_or_set_if(params, compute, ttl, |_| true).await
    }

    /// Like [`get_or_set`](Self::get_or_set), storing the computed value
    /// only when `cacheable` accepts it.
    pub async fn get_or_set_if<T, E, F, Fut, P>(
        &self,
        params: &CacheKeyParams,
        compute: F,
        ttl: Option<Duration>,
        cacheable: P,
    ) -> std::result::Result<CacheOutcome<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: FnOnce(&T) -> bool,
    {
        if !self.enabled {
            return Ok(CacheOutcome {
                value: compute().await?,
                from_cache: false,
            });
        }

        let key = self.keys.fingerprint(params);
        log::debug!("Cache lookup: key={}, source={}", short_key(&key), params.source);

        if let Some(value) = self.read(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::info!("Cache hit: {}", short_key(&key));
            return Ok(CacheOutcome {
                value,
                from_cache: true,
            });
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::info!("Cache miss: {}", short_key(&key));

        let value = compute().await?;

        if cacheable(&value) {
            self.write(&key, &params.source, &value, ttl.unwrap_or(self.ttl));
        } else {
            log::debug!("Result for {} not cacheable; skipping write", short_key(&key));
        }

        Ok(CacheOutcome {
            value,
            from_cache: false,
        })
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.repository.get_result(key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", short_key(key), e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Discarding undecodable cache entry {}: {}", short_key(key), e);
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, source: &str, value: &T, ttl: Duration) {
        let written = serde_json::to_value(value)
            .map_err(Into::into)
            .and_then(|value| self.repository.set(key, source, value, ttl));

        match written {
            Ok(()) => log::info!("Cache stored: {}", short_key(key)),
            Err(e) => log::warn!("Cache write failed for {}: {}", short_key(key), e),
        }
    }

    /// Remove the entry for `params`.
    pub fn invalidate(&self, params: &CacheKeyParams) -> Result<bool> {
        self.invalidate_key(&self.keys.fingerprint(params))
    }

    /// Remove the entry stored under `fingerprint`.
    pub fn invalidate_key(&self, fingerprint: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        self.repository.delete(fingerprint)
    }

    pub fn invalidate_by_source(&self, source: &str) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }
        self.repository.clear_by_source(source)
    }

    /// Clear the repository and reset the hit/miss counters.
    pub fn clear(&self) -> Result<usize> {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        if !self.enabled {
            return Ok(0);
        }
        self.repository.clear()
    }

    /// Sweep expired entries.
    pub fn prune(&self) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }
        self.repository.delete_expired()
    }

    pub fn stats(&self) -> Result<CacheServiceStats> {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        Ok(CacheServiceStats {
            enabled: self.enabled,
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            repository: if self.enabled {
                Some(self.repository.stats()?)
            } else {
                None
            },
        })
    }
}
