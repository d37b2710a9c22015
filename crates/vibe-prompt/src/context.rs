//! Layered context resolution.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vibe_core::{ContextOverrides, ContextWarning, GatewayError, RequestContext, ResolvedContext};

use crate::detect::DetectedContext;
use crate::presets::PresetCatalog;
use crate::warnings::{generate_warnings, WarningsConfig};

/// Context defaults, presets and detection toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Active preset applied to every request unless the request names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Whether auto-detection runs when the request does not say otherwise.
    #[serde(default = "default_auto_detect")]
    pub auto_detect: bool,
    /// Lowest-precedence context layer.
    #[serde(default)]
    pub defaults: ContextOverrides,
    /// User presets; shadow built-ins with the same id.
    #[serde(default)]
    pub presets: HashMap<String, ContextOverrides>,
}

fn default_auto_detect() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            preset: None,
            auto_detect: default_auto_detect(),
            defaults: ContextOverrides::default(),
            presets: HashMap::new(),
        }
    }
}

/// A resolved context together with its non-blocking warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResolution {
    pub context: ResolvedContext,
    pub warnings: Vec<ContextWarning>,
}

/// Merges defaults < preset < detected < request, field by field.
#[derive(Debug, Clone)]
pub struct ContextResolver {
    defaults: ContextOverrides,
    active_preset: Option<String>,
    auto_detect: bool,
    presets: PresetCatalog,
    suppressed: HashSet<String>,
}

impl ContextResolver {
    pub fn new(config: ContextConfig, warnings: &WarningsConfig) -> Self {
        Self {
            defaults: config.defaults,
            active_preset: config.preset,
            auto_detect: config.auto_detect,
            presets: PresetCatalog::new(config.presets),
            suppressed: warnings.suppressed(),
        }
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    /// Whether detection should run, given the request's own toggle.
    pub fn auto_detect_enabled(&self, requested: Option<bool>) -> bool {
        requested.unwrap_or(self.auto_detect)
    }

    /// Fails only when `preset` names a preset that does not exist.
    pub fn check_preset(&self, preset: Option<&str>) -> Result<(), GatewayError> {
        match preset {
            Some(id) if !self.presets.contains(id) => Err(GatewayError::Validation(format!(
                "unknown preset '{}' (available: {})",
                id,
                self.presets.ids().join(", ")
            ))),
            _ => Ok(()),
        }
    }

    /// Resolve the context for one request.
    ///
    /// `preset` is the request's preset id; the configured active preset
    /// applies when it is absent.
    pub fn resolve(
        &self,
        request: &RequestContext,
        preset: Option<&str>,
        detected: Option<&DetectedContext>,
    ) -> Result<ContextResolution, GatewayError> {
        self.check_preset(preset)?;

        let mut merged = self.defaults.clone();

        let preset_id = preset.or(self.active_preset.as_deref());
        let applied_preset = match preset_id.and_then(|id| self.presets.get(id).map(|p| (id, p))) {
            Some((id, layer)) => {
                merged.merge(&layer);
                Some(id.to_string())
            }
            None => None,
        };

        let mut signals = Vec::new();
        if let Some(detected) = detected {
            merged.merge(&detected.context);
            signals.extend(detected.signals.iter().cloned());
        }

        merged.merge(request);

        let context = ResolvedContext::from_layers(merged, applied_preset, signals);
        let warnings = generate_warnings(&context, &self.suppressed);

        debug!(
            "Resolved context: language={:?} preset={:?} signals={} warnings={}",
            context.language,
            context.preset,
            context.detected_signals.len(),
            warnings.len()
        );

        Ok(ContextResolution { context, warnings })
    }
}
