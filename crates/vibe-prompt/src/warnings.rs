//! Gap diagnostics for a resolved context.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use vibe_core::{ContextWarning, ResolvedContext};

pub const NO_LANGUAGE: &str = "NO_LANGUAGE";
pub const NO_FRAMEWORK: &str = "NO_FRAMEWORK";
pub const NO_THREAT_MODEL: &str = "NO_THREAT_MODEL";
pub const NO_FILE_NAME: &str = "NO_FILE_NAME";

/// Warning suppression settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningsConfig {
    /// Warning codes that are never emitted.
    #[serde(default)]
    pub suppress: Vec<String>,
}

impl WarningsConfig {
    pub fn suppressed(&self) -> HashSet<String> {
        self.suppress.iter().map(|code| code.trim().to_ascii_uppercase()).collect()
    }
}

fn wants_security_review(context: &ResolvedContext) -> bool {
    context
        .focus
        .iter()
        .any(|f| f.eq_ignore_ascii_case("security"))
}

/// Inspect `context` for gaps. Warnings never block a request.
pub fn generate_warnings(context: &ResolvedContext, suppressed: &HashSet<String>) -> Vec<ContextWarning> {
    let mut warnings = Vec::new();

    if context.language.is_none() {
        warnings.push(ContextWarning::new(
            NO_LANGUAGE,
            "No language could be resolved; findings may be less precise",
        ));
    }

    if context.platform.is_some() && context.framework.is_none() {
        warnings.push(ContextWarning::new(
            NO_FRAMEWORK,
            "A platform is set but no framework; framework-specific checks are skipped",
        ));
    }

    if wants_security_review(context) && context.threat_model.is_none() {
        warnings.push(ContextWarning::new(
            NO_THREAT_MODEL,
            "Security focus requested without a threat model",
        ));
    }

    if context.file_name.is_none() {
        warnings.push(ContextWarning::new(
            NO_FILE_NAME,
            "No file name given; reported line numbers are relative to the prompt",
        ));
    }

    warnings.retain(|w| !suppressed.contains(&w.code));
    warnings
}
