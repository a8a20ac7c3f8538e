//! Output formatting utilities for the CLI
//!
//! Tables for the audio graph's ports, a summary of a completed startup,
//! and colored status messages.

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use tsl_core::types::{PortDirection, PortEndpoint};
use tsl_orchestrator::{BufferSizeOutcome, StartupReport};

/// A port as printed by `ports`
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct PortRow {
    #[tabled(rename = "CLIENT")]
    pub client: String,
    #[tabled(rename = "PORT")]
    pub port: String,
}

/// Split raw port names into rows
///
/// Names the graph reports without a `client:port` shape are kept whole
/// under an empty client.
pub fn port_rows(ports: &[String]) -> Vec<PortRow> {
    ports
        .iter()
        .map(|name| match PortEndpoint::parse(name, PortDirection::Output) {
            Ok(endpoint) => PortRow {
                client: endpoint.client,
                port: endpoint.port,
            },
            Err(_) => PortRow {
                client: String::new(),
                port: name.clone(),
            },
        })
        .collect()
}

/// Format the audio graph's ports as an ASCII table
pub fn format_ports(ports: &[String]) -> String {
    if ports.is_empty() {
        return "No ports registered".to_string();
    }

    Table::new(port_rows(ports)).with(Style::rounded()).to_string()
}

/// Summarize a completed startup
pub fn format_report(report: &StartupReport) -> String {
    let connections = &report.connections;
    let mut output = String::new();

    output.push_str(&format!(
        "Ports ready after {} poll(s)\n",
        report.readiness_polls
    ));
    output.push_str(&format!(
        "Connections: {}/{} made\n",
        connections.connected.len(),
        connections.attempted()
    ));
    for connected in &connections.connected {
        output.push_str(&format!("  {}\n", connected));
    }

    match &report.buffer_size {
        Some(BufferSizeOutcome::Applied(frames)) => {
            output.push_str(&format!("Buffer size: {} frames\n", frames));
        }
        Some(BufferSizeOutcome::Failed { frames, .. }) => {
            output.push_str(&format!("Buffer size: {} frames not applied\n", frames));
        }
        None => output.push_str("Buffer size: server default\n"),
    }

    output
}

fn print_status<W: std::io::Write>(mut out: W, color: Color, symbol: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(symbol),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_status(std::io::stdout(), Color::Green, "✓ ", msg);
}

/// Print an error message to stderr in red with an X prefix
pub fn print_error(msg: &str) {
    print_status(std::io::stderr(), Color::Red, "✗ ", msg);
}

/// Print a warning message to stderr in yellow
pub fn print_warning(msg: &str) {
    print_status(std::io::stderr(), Color::Yellow, "⚠ ", msg);
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    print_status(std::io::stdout(), Color::Cyan, "ℹ ", msg);
}
