//! Cache fingerprints using SHA256 hashing

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current cache version - increment when the result format changes
pub const CACHE_VERSION: &str = "3";

/// Length of the log-correlation prefix returned by [`short_key`].
pub const SHORT_KEY_LEN: usize = 16;

/// Length of a hex-encoded fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// Inputs that determine whether two requests share a cached result.
///
/// Context and option strings are compared case-insensitively, `focus` is
/// order-insensitive, and absent fields hash the same as empty ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheKeyParams {
    /// Backend identifier; always hashed.
    pub source: String,
    /// Prompt text, hashed verbatim.
    pub prompt: String,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub platform: Option<String>,
    pub threat_model: Option<String>,
    pub file_name: Option<String>,
    pub scope: Option<String>,
    pub focus: Vec<String>,
    /// Severity filter; "all" is the default and hashes as absent.
    pub severity: Option<String>,
    pub template: Option<String>,
    /// Digest of the selected template text, so edited templates miss.
    pub template_digest: Option<String>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    /// Configured leading CLI arguments; order is significant.
    pub args: Vec<String>,
}

impl CacheKeyParams {
    pub fn new(source: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Canonical key/value form; ordering comes from the map.
    fn canonical(&self) -> BTreeMap<&'static str, serde_json::Value> {
        fn normalize(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
        }

        let mut fields = BTreeMap::new();
        fields.insert("source", self.source.trim().to_lowercase().into());
        fields.insert("prompt", self.prompt.clone().into());

        let optional = [
            ("language", &self.language),
            ("framework", &self.framework),
            ("platform", &self.platform),
            ("threatModel", &self.threat_model),
            ("fileName", &self.file_name),
            ("scope", &self.scope),
            ("template", &self.template),
            ("model", &self.model),
            ("reasoningEffort", &self.reasoning_effort),
        ];
        for (name, value) in optional {
            if let Some(v) = normalize(value) {
                fields.insert(name, v.into());
            }
        }

        if let Some(digest) = self.template_digest.as_deref().filter(|d| !d.is_empty()) {
            fields.insert("templateDigest", digest.into());
        }
        if !self.args.is_empty() {
            fields.insert("args", self.args.clone().into());
        }

        if let Some(severity) = normalize(&self.severity).filter(|s| s != "all") {
            fields.insert("severity", severity.into());
        }

        let mut focus: Vec<String> = self
            .focus
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        focus.sort();
        focus.dedup();
        if !focus.is_empty() {
            fields.insert("focus", focus.into());
        }

        fields
    }
}

/// Generates deterministic cache keys
#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    version: String,
}

impl CacheKeyGenerator {
    /// Create a new key generator with the current version
    pub fn new() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
        }
    }

    /// Create a key generator with a custom version
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// 64-hex-char digest of the normalized parameters.
    pub fn fingerprint(&self, params: &CacheKeyParams) -> String {
        let canonical = serde_json::Value::Object(
            params
                .canonical()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        );

        let mut hasher = Sha256::new();
        hasher.update(self.version.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Digest of the prompt text alone, ignoring context and options.
    pub fn prompt_hash(&self, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.as_bytes());
        hasher.update(b"|prompt|");
        hasher.update(prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get the current version
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA256 hex digest of arbitrary text, e.g. a template body.
pub fn text_digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Whether `key` has the shape of a fingerprint: 64 lowercase hex characters.
pub fn is_fingerprint(key: &str) -> bool {
    key.len() == FINGERPRINT_LEN && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Fixed-length prefix of a fingerprint for log correlation.
pub fn short_key(fingerprint: &str) -> &str {
    fingerprint.get(..SHORT_KEY_LEN).unwrap_or(fingerprint)
}
