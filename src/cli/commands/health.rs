use anyhow::{Result, bail};
use std::collections::BTreeMap;

use vibe_analyzer::HealthStatus;
use vibe_core::Backend;

use crate::config::GatewayConfig;
use crate::gateway::Gateway;

/// Print a health report per backend; fails when any checked backend is unusable.
pub fn run_health_command(backend: Option<Backend>, config: &GatewayConfig) -> Result<()> {
    let gateway = Gateway::new(config)?;
    let backends = match backend {
        Some(backend) => vec![backend],
        None => Backend::ALL.to_vec(),
    };

    let report: BTreeMap<&str, HealthStatus> = backends
        .iter()
        .map(|b| (b.id(), gateway.health(*b)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    let unhealthy: Vec<&str> = report
        .iter()
        .filter(|(_, status)| !status.healthy)
        .map(|(id, _)| *id)
        .collect();
    if !unhealthy.is_empty() {
        bail!("Unavailable backend(s): {}", unhealthy.join(", "));
    }
    Ok(())
}
