//! Template registry, selection and rendering.

mod builtin;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;
use vibe_core::{Backend, GatewayError, ResolvedContext};

use crate::traits::Prompt;
use crate::types::sanitize_for_prompt;

/// Id of the global default template.
pub const GLOBAL_DEFAULT_TEMPLATE: &str = "default";

/// Template overrides from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Replaces the text of the global default template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Additional templates, id to text. May shadow built-ins.
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

/// The JSON schema instructions appended to every prompt.
pub fn format_instructions() -> &'static str {
    builtin::FORMAT_INSTRUCTIONS
}

/// Render the resolved context as a markdown list.
pub fn render_context(context: &ResolvedContext) -> String {
    let fields = [
        ("Language", context.language.as_deref()),
        ("Framework", context.framework.as_deref()),
        ("Platform", context.platform.as_deref()),
        ("Threat Model", context.threat_model.as_deref()),
        ("File", context.file_name.as_deref()),
        ("Scope", context.scope.as_deref()),
    ];

    let mut lines: Vec<String> = fields
        .iter()
        .filter_map(|(label, value)| {
            value.map(|v| format!("- **{}**: {}", label, sanitize_for_prompt(v)))
        })
        .collect();

    if !context.focus.is_empty() {
        let focus: Vec<String> = context.focus.iter().map(|f| sanitize_for_prompt(f)).collect();
        lines.push(format!("- **Focus**: {}", focus.join(", ")));
    }

    if lines.is_empty() {
        "- No additional context provided".to_string()
    } else {
        lines.join("\n")
    }
}

/// Substitute `{prompt}`, `{context}` and `{formatInstructions}` in one pass.
///
/// Substituted values are never scanned again, so placeholders inside the
/// caller's prompt stay literal. Unknown placeholders are left as written.
fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let replaced = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });

        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// A template chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTemplate {
    pub id: String,
    pub text: String,
}

impl SelectedTemplate {
    /// Render the final analyzer prompt.
    pub fn render(&self, source: &str, context: &ResolvedContext) -> String {
        ReviewPrompt {
            template: &self.text,
            source,
            context,
        }
        .render()
    }
}

/// A code review prompt ready to render.
#[derive(Debug, Clone, Copy)]
pub struct ReviewPrompt<'a> {
    pub template: &'a str,
    pub source: &'a str,
    pub context: &'a ResolvedContext,
}

impl Prompt for ReviewPrompt<'_> {
    fn render(&self) -> String {
        let source = sanitize_for_prompt(self.source);
        let context = render_context(self.context);
        substitute(
            self.template,
            &[
                ("prompt", source.as_str()),
                ("context", context.as_str()),
                ("formatInstructions", format_instructions()),
            ],
        )
    }
}

/// Known templates plus per-backend default overrides.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, String>,
    backend_defaults: HashMap<Backend, String>,
}

impl TemplateRegistry {
    /// Registry holding only the built-in templates.
    pub fn builtin() -> Self {
        Self {
            templates: builtin::BUILTIN
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
            backend_defaults: HashMap::new(),
        }
    }

    /// Built-ins overlaid with configured templates.
    pub fn from_config(config: &TemplatesConfig) -> Self {
        let mut registry = Self::builtin();
        if let Some(text) = &config.default {
            registry.register(GLOBAL_DEFAULT_TEMPLATE, text.clone());
        }
        for (id, text) in &config.custom {
            registry.register(id.clone(), text.clone());
        }
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(id.into(), text.into());
    }

    /// Use template `id` as the default for `backend`.
    pub fn set_backend_default(&mut self, backend: Backend, id: impl Into<String>) {
        self.backend_defaults.insert(backend, id.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    fn get(&self, id: &str) -> Option<SelectedTemplate> {
        self.templates.get(id).map(|text| SelectedTemplate {
            id: id.to_string(),
            text: text.clone(),
        })
    }

    /// Requested id > backend default > global default.
    ///
    /// A requested id that does not exist is a validation error.
    pub fn select(&self, requested: Option<&str>, backend: Backend) -> Result<SelectedTemplate, GatewayError> {
        if let Some(id) = requested {
            return self.get(id).ok_or_else(|| {
                GatewayError::Validation(format!(
                    "unknown template '{}' (available: {})",
                    id,
                    self.ids().join(", ")
                ))
            });
        }

        let backend_default = self
            .backend_defaults
            .get(&backend)
            .map(String::as_str)
            .unwrap_or(backend.default_template_id());

        if let Some(template) = self.get(backend_default) {
            return Ok(template);
        }
        warn!(
            "Template '{}' for {} is not registered; using '{}'",
            backend_default, backend, GLOBAL_DEFAULT_TEMPLATE
        );

        self.get(GLOBAL_DEFAULT_TEMPLATE).ok_or_else(|| {
            GatewayError::Validation(format!("template '{}' is not registered", GLOBAL_DEFAULT_TEMPLATE))
        })
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
