//! Ports command implementation

use anyhow::{Context, Result};

use crate::output::{format_ports, port_rows};
use tsl_core::config::LauncherConfig;
use tsl_core::traits::AudioGraph;
use tsl_orchestrator::JackTools;

/// List the ports currently registered with the audio server
pub async fn ports_command(config: &LauncherConfig, json: bool) -> Result<()> {
    let graph = JackTools::from_config(config);
    let ports = graph
        .list_ports()
        .await
        .context("Failed to list audio ports (is the audio server running?)")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&port_rows(&ports))?);
    } else {
        println!("{}", format_ports(&ports));
    }

    Ok(())
}
