//! Analyzer CLI integration for vibe-gateway.
//!
//! This crate locates the analyzer executable against a whitelist, runs it
//! with the prompt on stdin under a timeout, and retries transient failures
//! with exponential backoff.

mod executor;
mod resolver;
mod retry;

pub use executor::{CliExecutor, CliInvocation, ProcessExecutor};
pub use resolver::{PathResolver, PathSource, ResolvedCliPath, AUTO_DETECT};
pub use retry::RetryPolicy;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vibe_core::Backend;

/// Per-backend CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// "auto", a bare executable name, or an absolute path.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    /// Timeout in milliseconds for each execution; `0` means unlimited.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts, including the first one.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound for the backoff delay in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Model passed with `--model` and in the backend model variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Reasoning effort (codex only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    /// Leading arguments placed before the generated flags.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_cli_path() -> String {
    AUTO_DETECT.to_string()
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            model: None,
            reasoning_effort: None,
            args: Vec::new(),
            working_dir: None,
        }
    }
}

impl CliConfig {
    /// Defaults tuned for a given backend.
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Codex => Self {
                args: vec!["exec".to_string()],
                ..Self::default()
            },
            Backend::Gemini => Self::default(),
        }
    }

    /// Set the CLI path.
    pub fn with_cli_path(mut self, path: impl Into<String>) -> Self {
        self.cli_path = path.into();
        self
    }

    /// Set the timeout in milliseconds.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the retry attempts and initial delay.
    pub fn with_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Backoff policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
        .with_max_delay(Duration::from_millis(self.max_retry_delay_ms))
    }

    /// Build the process invocation for a resolved executable.
    ///
    /// Only configuration ends up on the command line; request data travels
    /// over stdin.
    pub fn invocation(&self, backend: Backend, program: PathBuf) -> CliInvocation {
        let mut invocation = CliInvocation::new(program).with_args(self.args.iter().cloned());

        if backend == Backend::Codex {
            if let Some(effort) = &self.reasoning_effort {
                invocation = invocation
                    .with_args(["--config".to_string(), format!("model_reasoning_effort={}", effort)]);
            }
        }

        if let Some(model) = self.model.as_ref().filter(|m| !m.is_empty()) {
            invocation = invocation
                .with_args(["--model".to_string(), model.clone()])
                .with_env(backend.model_env(), model.clone());
        }

        if let Some(dir) = &self.working_dir {
            invocation = invocation.with_working_dir(dir.clone());
        }

        invocation.with_args(["--output-format".to_string(), "json".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.cli_path, "auto");
        assert_eq!(config.timeout_ms, 120_000);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.model.is_none());
    }

    #[test]
    fn test_retry_attempts_never_zero() {
        let config = CliConfig::default().with_retry(0, 10);
        assert_eq!(config.retry_attempts, 1);
    }

    #[test]
    fn test_invocation_argument_order() {
        let config = CliConfig::for_backend(Backend::Codex).with_model("gpt-5-codex");
        let invocation = config.invocation(Backend::Codex, PathBuf::from("codex"));

        assert_eq!(
            invocation.args,
            vec!["exec", "--model", "gpt-5-codex", "--output-format", "json"]
        );
        assert_eq!(
            invocation.env,
            vec![("CODEX_MODEL".to_string(), "gpt-5-codex".to_string())]
        );
    }

    #[test]
    fn test_invocation_reasoning_effort_codex_only() {
        let mut config = CliConfig::default();
        config.reasoning_effort = Some("high".to_string());

        let codex = config.invocation(Backend::Codex, PathBuf::from("codex"));
        assert!(codex.args.contains(&"model_reasoning_effort=high".to_string()));

        let gemini = config.invocation(Backend::Gemini, PathBuf::from("gemini"));
        assert_eq!(gemini.args, vec!["--output-format", "json"]);
        assert!(gemini.env.is_empty());
    }
}
