//! Connect command implementation

use anyhow::{Context, Result};

use crate::output::{print_error, print_success};
use tsl_core::config::LauncherConfig;
use tsl_core::types::ConnectionSpec;
use tsl_orchestrator::connect::connect_with_retry;
use tsl_orchestrator::JackTools;

/// Patch a single output port to an input port
pub async fn connect_command(config: &LauncherConfig, source: &str, destination: &str) -> Result<()> {
    let spec = ConnectionSpec::new(source, destination)
        .with_context(|| format!("Invalid connection {} -> {}", source, destination))?;

    let graph = JackTools::from_config(config);
    match connect_with_retry(&graph, &spec, &config.retry).await {
        Ok(attempt) if attempt > 1 => {
            print_success(&format!("Connected {} (after {} attempts)", spec, attempt));
            Ok(())
        }
        Ok(_) => {
            print_success(&format!("Connected {}", spec));
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            Err(e.into())
        }
    }
}
