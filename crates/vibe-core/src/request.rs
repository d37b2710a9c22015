//! Inbound analysis requests and their validation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::context::ContextOverrides;
use crate::error::GatewayError;
use crate::finding::SeverityFilter;

/// Upper bound on the prompt text accepted from a caller.
pub const MAX_PROMPT_BYTES: usize = 512 * 1024;

/// Upper bound on a per-request timeout override (30 minutes).
pub const MAX_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Caller-supplied context fields.
pub type RequestContext = ContextOverrides;

/// Caller-supplied options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RequestOptions {
    pub severity: Option<SeverityFilter>,
    /// Per-request timeout in milliseconds; `0` means unlimited.
    pub timeout: Option<u64>,
    pub auto_detect: Option<bool>,
    pub template: Option<String>,
    pub cli_path: Option<String>,
    pub preset: Option<String>,
}

/// A code-review request as received from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalysisRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: Option<RequestContext>,
    #[serde(default)]
    pub options: Option<RequestOptions>,
}

impl AnalysisRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: None,
            options: None,
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Parse and validate a JSON-encoded request.
    pub fn from_json(raw: &str) -> Result<Self, GatewayError> {
        let request: AnalysisRequest = serde_json::from_str(raw)
            .map_err(|e| GatewayError::Validation(format!("malformed request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    /// Reject malformed parameters before any side effect takes place.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.prompt.trim().is_empty() {
            return Err(GatewayError::Validation("prompt must not be empty".to_string()));
        }
        if self.prompt.len() > MAX_PROMPT_BYTES {
            return Err(GatewayError::Validation(format!(
                "prompt is {} bytes, maximum is {}",
                self.prompt.len(),
                MAX_PROMPT_BYTES
            )));
        }

        if let Some(context) = &self.context {
            if let Some(focus) = &context.focus {
                if focus.iter().any(|f| f.trim().is_empty()) {
                    return Err(GatewayError::Validation(
                        "context.focus entries must not be empty".to_string(),
                    ));
                }
            }
        }

        if let Some(options) = &self.options {
            if let Some(timeout) = options.timeout {
                if timeout > MAX_TIMEOUT_MS {
                    return Err(GatewayError::Validation(format!(
                        "options.timeout {}ms exceeds maximum of {}ms",
                        timeout, MAX_TIMEOUT_MS
                    )));
                }
            }
            for (field, value) in [
                ("template", &options.template),
                ("cliPath", &options.cli_path),
                ("preset", &options.preset),
            ] {
                if matches!(value, Some(v) if v.trim().is_empty()) {
                    return Err(GatewayError::Validation(format!(
                        "options.{} must not be empty when given",
                        field
                    )));
                }
            }
            if let Some(cli_path) = &options.cli_path {
                if cli_path.contains('\0') {
                    return Err(GatewayError::Validation(
                        "options.cliPath contains a NUL byte".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn options(&self) -> RequestOptions {
        self.options.clone().unwrap_or_default()
    }

    pub fn context(&self) -> RequestContext {
        self.context.clone().unwrap_or_default()
    }

    /// File name hint for auto-detection, if the caller gave one.
    pub fn file_name(&self) -> Option<PathBuf> {
        self.context
            .as_ref()
            .and_then(|c| c.file_name.as_ref())
            .map(PathBuf::from)
    }
}
