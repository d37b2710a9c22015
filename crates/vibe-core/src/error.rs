//! Gateway error taxonomy.

use thiserror::Error;
use uuid::Uuid;

use crate::backend::Backend;

/// Errors raised by gateway components.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The analyzer path is not on the whitelist.
    #[error("untrusted analyzer path '{path}' (whitelist: {})", .whitelist.join(", "))]
    Security { path: String, whitelist: Vec<String> },

    #[error("analyzer timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Non-zero exit or spawn failure.
    #[error("analyzer exited with {}: {}", .exit_code.map_or_else(|| "no exit code".to_string(), |c| format!("code {}", c)), .stderr.trim())]
    CliExecution {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("failed to validate analyzer response: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn is_security(&self) -> bool {
        matches!(self, GatewayError::Security { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GatewayError::Validation(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Security { .. } => "security",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::CliExecution { .. } => "cli_execution",
            GatewayError::Parse(_) => "parse",
            GatewayError::Validation(_) => "validation",
            GatewayError::Io(_) => "io",
        }
    }
}

/// Whether retrying the failed operation could change the outcome.
///
/// Security, validation and parse failures are deterministic for the same
/// input and are never retried.
pub fn is_retryable(error: &GatewayError) -> bool {
    match error {
        GatewayError::Timeout { .. } | GatewayError::CliExecution { .. } => true,
        GatewayError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::UnexpectedEof
        ),
        GatewayError::Security { .. } | GatewayError::Parse(_) | GatewayError::Validation(_) => {
            false
        }
    }
}

/// Terminal error for a single request, identified by backend and analysis id.
#[derive(Error, Debug)]
#[error("{backend} analysis {analysis_id} failed: {cause}")]
pub struct AnalysisError {
    pub backend: Backend,
    pub analysis_id: Uuid,
    #[source]
    pub cause: GatewayError,
}

impl AnalysisError {
    pub fn new(backend: Backend, analysis_id: Uuid, cause: GatewayError) -> Self {
        Self {
            backend,
            analysis_id,
            cause,
        }
    }
}
