//! JACK command-line graph backend
//!
//! Talks to the running server through `jack_lsp`, `jack_connect` and
//! `jack_bufsize`, the same tools an operator would use by hand.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::process::Command;

use tsl_core::config::{JackToolsConfig, LauncherConfig};
use tsl_core::error::GraphError;
use tsl_core::traits::AudioGraph;
use tsl_core::types::PortEndpoint;

/// What `jack_connect` prints for a port the server does not know
const INVALID_PORT: &str = "not a valid port";

/// [`AudioGraph`] backed by the JACK example-client tools
#[derive(Debug, Clone)]
pub struct JackTools {
    tools: JackToolsConfig,
    env: Vec<(String, String)>,
}

impl JackTools {
    /// Create a backend with explicit tool paths and environment
    pub fn new(tools: JackToolsConfig, env: Vec<(String, String)>) -> Self {
        Self { tools, env }
    }

    /// Create a backend from launcher configuration
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self::new(config.jack_tools.clone(), config.shared_env())
    }

    async fn run(&self, tool: &str, args: &[String]) -> Result<String, GraphError> {
        tracing::trace!("Running {} {:?}", tool, args);

        let output = Command::new(tool)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => GraphError::ToolNotFound(tool.to_string()),
                _ => GraphError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(GraphError::ToolFailed {
                tool: tool.to_string(),
                status: output.status.to_string(),
                // Some tools report errors on stdout
                stderr: if stderr.is_empty() { stdout } else { stderr },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl AudioGraph for JackTools {
    async fn list_ports(&self) -> Result<Vec<String>, GraphError> {
        let output = self.run(&self.tools.lsp, &[]).await?;
        Ok(parse_port_listing(&output))
    }

    async fn connect(
        &self,
        source: &PortEndpoint,
        destination: &PortEndpoint,
    ) -> Result<(), GraphError> {
        let result = self
            .run(
                &self.tools.connect,
                &[source.full_name(), destination.full_name()],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(GraphError::ToolFailed { stderr, .. }) if stderr.contains(INVALID_PORT) => {
                let port = [source, destination]
                    .into_iter()
                    .map(|endpoint| endpoint.full_name())
                    .find(|name| stderr.contains(name.as_str()))
                    .unwrap_or(stderr);
                Err(GraphError::NoSuchPort(port))
            }
            Err(e) => Err(e),
        }
    }

    async fn set_buffer_size(&self, frames: u32) -> Result<(), GraphError> {
        self.run(&self.tools.bufsize, &[frames.to_string()]).await?;
        Ok(())
    }
}

/// Extract port names from `jack_lsp` output
///
/// Port names are flush-left, one per line; indented lines carry
/// connection or property details and are skipped.
pub fn parse_port_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .map(str::trim)
        .filter(|line| line.contains(':'))
        .map(str::to_string)
        .collect()
}
