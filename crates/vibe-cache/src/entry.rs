//! Cache entry structure

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted analysis result and its expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache format version
    pub version: String,

    /// Fingerprint of the request parameters
    pub key: String,

    /// Backend that produced the value
    pub source: String,

    /// Serialized result
    pub value: serde_json::Value,

    pub created_at: DateTime<Utc>,

    /// `None` when the entry never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Create an entry expiring `ttl` from now; a zero `ttl` never expires.
    pub fn new(
        version: impl Into<String>,
        key: impl Into<String>,
        source: impl Into<String>,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        let expires_at = if ttl.is_zero() {
            None
        } else {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
        };

        Self {
            version: version.into(),
            key: key.into(),
            source: source.into(),
            value,
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
