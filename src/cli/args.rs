use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

use vibe_core::{AnalysisRequest, Backend, RequestOptions, SeverityFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Configuration file merged on top of the user and project files
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bypass the result cache for this invocation
    #[arg(long, global = true)]
    pub no_cache: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Review code with an AI backend and print the result as JSON
    Analyze(AnalyzeArgs),

    /// Check whether backend CLIs can be found
    Health {
        /// Only check this backend
        #[arg(short, long)]
        backend: Option<Backend>,
    },

    /// Result cache management
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Backend performing the review
    #[arg(short, long, default_value = "codex")]
    pub backend: Backend,

    /// JSON request file, or `-` for stdin; flags below override its fields
    #[arg(short, long)]
    pub request: Option<PathBuf>,

    /// Code or question to review
    #[arg(short, long, conflicts_with = "file")]
    pub prompt: Option<String>,

    /// Read the code to review from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub language: Option<String>,

    #[arg(long)]
    pub framework: Option<String>,

    #[arg(long)]
    pub platform: Option<String>,

    /// File name hint for context detection; defaults to the name given with --file
    #[arg(long)]
    pub file_name: Option<String>,

    /// Comma-separated focus areas, e.g. security,performance
    #[arg(long, value_delimiter = ',')]
    pub focus: Vec<String>,

    /// Minimum severity to report: high, medium or all
    #[arg(short, long)]
    pub severity: Option<SeverityFilter>,

    /// Prompt template id
    #[arg(short, long)]
    pub template: Option<String>,

    /// Context preset id
    #[arg(long)]
    pub preset: Option<String>,

    /// Per-request timeout in milliseconds; 0 disables the timeout
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Analyzer executable; must be on the trusted whitelist
    #[arg(long)]
    pub cli_path: Option<String>,

    /// Disable context auto-detection
    #[arg(long)]
    pub no_auto_detect: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,

    /// Remove cached results
    Clear {
        /// Only remove results produced by this backend
        #[arg(long)]
        source: Option<Backend>,
    },

    /// Remove expired entries
    Prune,

    /// Remove one entry by its fingerprint
    Invalidate {
        fingerprint: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Destination (defaults to ./vibe-gateway.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the merged configuration
    Show,
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

impl AnalyzeArgs {
    /// Assemble the request: the `--request` document first, then individual flags.
    pub fn to_request(&self) -> Result<AnalysisRequest> {
        let mut request = match &self.request {
            Some(path) => {
                let raw = read_source(path)?;
                serde_json::from_str::<AnalysisRequest>(&raw)
                    .with_context(|| format!("Malformed request in {}", path.display()))?
            }
            None => AnalysisRequest::new(String::new()),
        };

        if let Some(prompt) = &self.prompt {
            request.prompt = prompt.clone();
        }

        let mut context = request.context();
        if let Some(file) = &self.file {
            request.prompt = read_source(file)?;
            if context.file_name.is_none() && file != Path::new("-") {
                context.file_name = file.file_name().map(|n| n.to_string_lossy().to_string());
            }
        }

        if request.prompt.is_empty() {
            bail!("Nothing to analyze: pass --prompt, --file or --request");
        }

        for (target, value) in [
            (&mut context.language, &self.language),
            (&mut context.framework, &self.framework),
            (&mut context.platform, &self.platform),
            (&mut context.file_name, &self.file_name),
        ] {
            if value.is_some() {
                target.clone_from(value);
            }
        }
        if !self.focus.is_empty() {
            context.focus = Some(self.focus.clone());
        }
        if !context.is_empty() {
            request.context = Some(context);
        }

        let mut options: RequestOptions = request.options();
        if self.severity.is_some() {
            options.severity = self.severity;
        }
        if self.timeout_ms.is_some() {
            options.timeout = self.timeout_ms;
        }
        if self.no_auto_detect {
            options.auto_detect = Some(false);
        }
        for (target, value) in [
            (&mut options.template, &self.template),
            (&mut options.preset, &self.preset),
            (&mut options.cli_path, &self.cli_path),
        ] {
            if value.is_some() {
                target.clone_from(value);
            }
        }
        if options != RequestOptions::default() {
            request.options = Some(options);
        }

        Ok(request)
    }
}
