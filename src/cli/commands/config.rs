use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::cli::args::ConfigAction;
use crate::config::GatewayConfig;

pub fn handle_config_command(action: &ConfigAction, config: &GatewayConfig) -> Result<()> {
    match action {
        ConfigAction::Init { output, force } => {
            let default_path = GatewayConfig::get_current_config_path();
            let path: &Path = output.as_deref().unwrap_or(&default_path);
            if path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, GatewayConfig::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Show => print!("{}", config.to_toml()?),
    }
    Ok(())
}
