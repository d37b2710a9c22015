//! Built-in and user-defined context presets.

use std::collections::{BTreeSet, HashMap};

use vibe_core::ContextOverrides;

/// Ids of the presets shipped with the gateway.
pub const BUILTIN_PRESETS: &[&str] = &["web-api", "frontend", "cli-tool", "library", "security-audit"];

fn preset(
    platform: &str,
    threat_model: &str,
    scope: &str,
    focus: &[&str],
) -> ContextOverrides {
    ContextOverrides {
        platform: Some(platform.to_string()),
        threat_model: Some(threat_model.to_string()),
        scope: Some(scope.to_string()),
        focus: Some(focus.iter().map(|f| f.to_string()).collect()),
        ..Default::default()
    }
}

fn builtin(id: &str) -> Option<ContextOverrides> {
    let preset = match id {
        "web-api" => preset(
            "server",
            "untrusted network clients",
            "api",
            &["security", "input-validation", "authentication"],
        ),
        "frontend" => preset(
            "browser",
            "malicious page content and third-party scripts",
            "ui",
            &["security", "xss", "accessibility"],
        ),
        "cli-tool" => preset(
            "desktop",
            "local user with untrusted arguments and files",
            "cli",
            &["error-handling", "input-validation"],
        ),
        "library" => preset(
            "library",
            "untrusted callers of the public API",
            "library",
            &["api-design", "correctness"],
        ),
        "security-audit" => preset(
            "server",
            "external attacker",
            "full",
            &["security", "injection", "authentication", "secrets"],
        ),
        _ => return None,
    };
    Some(preset)
}

/// Lookup table of presets; user presets shadow built-ins with the same id.
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    custom: HashMap<String, ContextOverrides>,
}

impl PresetCatalog {
    pub fn new(custom: HashMap<String, ContextOverrides>) -> Self {
        Self { custom }
    }

    pub fn get(&self, id: &str) -> Option<ContextOverrides> {
        self.custom.get(id).cloned().or_else(|| builtin(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.custom.contains_key(id) || BUILTIN_PRESETS.contains(&id)
    }

    /// Every known preset id, sorted.
    pub fn ids(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = BUILTIN_PRESETS
            .iter()
            .copied()
            .chain(self.custom.keys().map(String::as_str))
            .collect();
        ids.into_iter().map(str::to_string).collect()
    }
}
