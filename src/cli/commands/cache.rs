//! Cache management commands

use anyhow::Result;
use serde_json::json;
use tracing::warn;

use crate::cli::args::CacheAction;
use crate::config::{CacheStorage, GatewayConfig};
use crate::gateway::Gateway;

/// Execute cache command
pub fn handle_cache_command(action: &CacheAction, config: &GatewayConfig) -> Result<()> {
    if config.cache.storage == CacheStorage::Memory {
        warn!("Cache storage is 'memory'; entries do not outlive a single process");
    }

    // Management commands work on the configured store even when lookups are disabled.
    let mut config = config.clone();
    config.cache.enabled = true;
    let gateway = Gateway::new(&config)?;
    let cache = gateway.cache();

    let report = match action {
        CacheAction::Stats => json!({
            "directory": config.cache.directory,
            "storage": config.cache.storage,
            "ttlMs": config.cache.ttl_ms,
            "maxSize": config.cache.max_size,
            "stats": cache.stats()?,
        }),
        CacheAction::Clear { source: Some(source) } => json!({
            "removed": cache.invalidate_by_source(source.id())?,
            "source": source,
        }),
        CacheAction::Clear { source: None } => json!({ "removed": cache.clear()? }),
        CacheAction::Prune => json!({ "removed": cache.prune()? }),
        CacheAction::Invalidate { fingerprint } => json!({
            "fingerprint": fingerprint,
            "removed": cache.invalidate_key(fingerprint.trim())?,
        }),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
