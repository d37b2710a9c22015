//! Context resolution and prompt rendering for vibe-gateway.
//!
//! A request's context is merged from four layers, later layers winning
//! field by field: built-in defaults, the active preset, auto-detected
//! signals, and the caller's explicit fields. The merged context is then
//! rendered into the backend prompt through a template.
//!
//! # Example
//!
//! ```rust
//! use vibe_prompt::{ContextConfig, ContextResolver, TemplateRegistry, WarningsConfig};
//! use vibe_core::{Backend, RequestContext};
//!
//! let resolver = ContextResolver::new(ContextConfig::default(), &WarningsConfig::default());
//! let request = RequestContext {
//!     language: Some("Rust".to_string()),
//!     ..Default::default()
//! };
//! let resolution = resolver.resolve(&request, None, None).unwrap();
//!
//! let registry = TemplateRegistry::builtin();
//! let template = registry.select(None, Backend::Codex).unwrap();
//! let prompt = template.render("fn main() {}", &resolution.context);
//! assert!(prompt.contains("fn main() {}"));
//! ```

mod context;
mod detect;
mod presets;
mod templates;
mod traits;
mod types;
mod warnings;

pub use context::{ContextConfig, ContextResolution, ContextResolver};
pub use detect::{ContextDetector, DetectedContext, FileNameDetector, NoDetection};
pub use presets::{PresetCatalog, BUILTIN_PRESETS};
pub use templates::{
    format_instructions, render_context, ReviewPrompt, SelectedTemplate, TemplateRegistry, TemplatesConfig,
    GLOBAL_DEFAULT_TEMPLATE,
};
pub use traits::Prompt;
pub use types::sanitize_for_prompt;
pub use warnings::{generate_warnings, WarningsConfig};
