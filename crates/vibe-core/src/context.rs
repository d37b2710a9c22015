//! Context layers and the resolved context snapshot.

use serde::{Deserialize, Serialize};

/// A partial context: one layer of defaults, a preset, detected signals or
/// the caller's own overrides. Absent fields leave lower layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<Vec<String>>,
}

impl ContextOverrides {
    /// Overlay `other` onto `self`, field by field. Present fields in `other` win.
    pub fn merge(&mut self, other: &ContextOverrides) {
        fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if source.is_some() {
                target.clone_from(source);
            }
        }

        overlay(&mut self.language, &other.language);
        overlay(&mut self.framework, &other.framework);
        overlay(&mut self.platform, &other.platform);
        overlay(&mut self.threat_model, &other.threat_model);
        overlay(&mut self.file_name, &other.file_name);
        overlay(&mut self.scope, &other.scope);
        overlay(&mut self.focus, &other.focus);
    }

    pub fn is_empty(&self) -> bool {
        *self == ContextOverrides::default()
    }
}

/// Final merged view of defaults, preset, detected signals and request fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedContext {
    pub language: Option<String>,
    pub framework: Option<String>,
    pub platform: Option<String>,
    pub threat_model: Option<String>,
    pub file_name: Option<String>,
    pub scope: Option<String>,
    #[serde(default)]
    pub focus: Vec<String>,
    /// Preset that contributed to this context, if any.
    pub preset: Option<String>,
    /// Auto-detection signals that contributed to this context.
    #[serde(default)]
    pub detected_signals: Vec<String>,
}

impl ResolvedContext {
    pub fn from_layers(
        merged: ContextOverrides,
        preset: Option<String>,
        detected_signals: Vec<String>,
    ) -> Self {
        Self {
            language: merged.language,
            framework: merged.framework,
            platform: merged.platform,
            threat_model: merged.threat_model,
            file_name: merged.file_name,
            scope: merged.scope,
            focus: merged.focus.unwrap_or_default(),
            preset,
            detected_signals,
        }
    }
}

/// Non-blocking diagnostic about gaps in the resolved context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWarning {
    pub code: String,
    pub message: String,
}

impl ContextWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
