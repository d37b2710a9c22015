//! Analyzer subprocess executor.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use vibe_core::GatewayError;

/// A fully assembled analyzer command line. Never carries request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
}

impl CliInvocation {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.args.extend(args);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}

/// Runs the analyzer once. Retries are the caller's concern.
#[async_trait]
pub trait CliExecutor: Send + Sync {
    /// Run `invocation` with `prompt` on stdin; `timeout_ms == 0` means unlimited.
    async fn execute(
        &self,
        invocation: &CliInvocation,
        prompt: &str,
        timeout_ms: u64,
    ) -> Result<String, GatewayError>;
}

/// Executor backed by a real child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, invocation: &CliInvocation, prompt: &str) -> Result<String, GatewayError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        debug!("Spawning analyzer process: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| GatewayError::CliExecution {
            exit_code: None,
            stdout: String::new(),
            stderr: if e.kind() == std::io::ErrorKind::NotFound {
                format!("analyzer binary not found: {}", invocation.program.display())
            } else {
                format!("failed to spawn analyzer: {}", e)
            },
        })?;

        // Feed stdin concurrently with draining stdout/stderr so a chatty
        // child cannot fill its output pipe while we are still writing.
        let stdin = child.stdin.take();
        let write_prompt = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (written, output) = tokio::join!(write_prompt, child.wait_with_output());
        let output = output?;

        if let Err(e) = written {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                debug!("Analyzer closed stdin early");
            } else {
                return Err(GatewayError::Io(e));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(GatewayError::CliExecution {
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        if stdout.trim().is_empty() {
            if !stderr.trim().is_empty() {
                warn!("Analyzer wrote nothing to stdout; using stderr as payload");
            }
            Ok(stderr)
        } else {
            if !stderr.trim().is_empty() {
                debug!("Analyzer stderr: {}", stderr.trim());
            }
            Ok(stdout)
        }
    }
}

#[async_trait]
impl CliExecutor for ProcessExecutor {
    async fn execute(
        &self,
        invocation: &CliInvocation,
        prompt: &str,
        timeout_ms: u64,
    ) -> Result<String, GatewayError> {
        if timeout_ms == 0 {
            return self.run(invocation, prompt).await;
        }

        // Dropping the future drops the child, and kill_on_drop reaps it.
        timeout(Duration::from_millis(timeout_ms), self.run(invocation, prompt))
            .await
            .map_err(|_| GatewayError::Timeout { timeout_ms })?
    }
}
