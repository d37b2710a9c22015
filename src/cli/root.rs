use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::cli::args::{Args, Commands};
use crate::cli::commands::{
    handle_cache_command, handle_config_command, run_analyze_command, run_health_command,
};
use crate::config::GatewayConfig;

pub struct RootCommand;

impl RootCommand {
    pub async fn execute(args: Args) -> Result<()> {
        let config = Self::load_config(&args)?;

        match &args.command {
            Commands::Analyze(analyze) => run_analyze_command(analyze, &config).await,
            Commands::Health { backend } => run_health_command(*backend, &config),
            Commands::Cache { action } => handle_cache_command(action, &config),
            Commands::Config { action } => handle_config_command(action, &config),
        }
    }

    /// Resolve the effective configuration: files, then `VIBE_*` variables,
    /// then command-line flags.
    pub fn load_config(args: &Args) -> Result<GatewayConfig> {
        let env_vars: HashMap<String, String> = std::env::vars().collect();
        let mut config = GatewayConfig::load_with_precedence(args.config.as_deref(), &env_vars)
            .context("Failed to load configuration")?;

        if args.no_cache {
            config.cache.enabled = false;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
