//! Analyzer backend identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the interchangeable external analyzer CLIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Codex,
    Gemini,
}

impl Backend {
    /// All known backends.
    pub const ALL: [Backend; 2] = [Backend::Codex, Backend::Gemini];

    /// Stable identifier used for cache partitioning and logs.
    pub fn id(&self) -> &'static str {
        match self {
            Backend::Codex => "codex",
            Backend::Gemini => "gemini",
        }
    }

    /// Bare executable name looked up on the system search path.
    pub fn executable_name(&self) -> &'static str {
        self.id()
    }

    /// Environment variable that overrides the CLI location.
    pub fn cli_path_env(&self) -> &'static str {
        match self {
            Backend::Codex => "CODEX_CLI_PATH",
            Backend::Gemini => "GEMINI_CLI_PATH",
        }
    }

    /// Environment variable handed to the child process carrying the model.
    pub fn model_env(&self) -> &'static str {
        match self {
            Backend::Codex => "CODEX_MODEL",
            Backend::Gemini => "GEMINI_MODEL",
        }
    }

    /// Template used when neither the request nor config names one.
    pub fn default_template_id(&self) -> &'static str {
        match self {
            Backend::Codex => "codex-default",
            Backend::Gemini => "gemini-default",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "codex" => Ok(Backend::Codex),
            "gemini" => Ok(Backend::Gemini),
            other => Err(format!(
                "unknown backend '{}' (valid values: codex, gemini)",
                other
            )),
        }
    }
}
