use anyhow::Result;
use tracing::{debug, info};

use crate::cli::args::AnalyzeArgs;
use crate::config::GatewayConfig;
use crate::gateway::Gateway;

/// Run one analysis and print the result as JSON on stdout.
pub async fn run_analyze_command(args: &AnalyzeArgs, config: &GatewayConfig) -> Result<()> {
    let request = args.to_request()?;
    debug!(
        "Analyze request for {}: {} prompt bytes",
        args.backend,
        request.prompt.len()
    );

    let gateway = Gateway::new(config)?;
    let result = gateway.analyze(args.backend, request).await?;

    info!(
        "Analysis {} finished with {} findings (cached: {})",
        result.analysis_id,
        result.findings.len(),
        result.metadata.from_cache
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
