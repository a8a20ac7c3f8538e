//! Error types for the launcher

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{ConnectionSpec, ProcessRole};

/// Fatal errors that abort the startup sequence
#[derive(Error, Debug)]
pub enum StartupError {
    /// The audio server could not be started
    #[error("Audio server launch failed: {0}")]
    ServerLaunch(String),

    /// The client application could not be started
    #[error("Client launch failed: {0}")]
    ClientLaunch(String),

    /// The effects host could not be started
    #[error("Effects host launch failed: {0}")]
    EffectsLaunch(String),

    /// Required ports did not appear in time
    #[error("Ports not ready after {timeout:?}, missing: {}", missing.join(", "))]
    ReadinessTimeout {
        timeout: Duration,
        missing: Vec<String>,
    },

    /// An orchestrated process died before startup completed
    #[error("{role} process exited unexpectedly ({status})")]
    ProcessExited { role: ProcessRole, status: String },

    /// Another launcher already owns the audio device
    #[error("Another launcher is already running (PID {0})")]
    AlreadyRunning(u32),

    /// Audio graph error
    #[error("Audio graph error: {0}")]
    Graph(#[from] GraphError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single connection that could not be made
///
/// These are reported per connection and never abort the sequence.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Could not connect {spec} after {attempts} attempt(s): {reason}")]
pub struct PortConnectionError {
    /// The connection that failed
    pub spec: ConnectionSpec,
    /// How many times the connection was tried
    pub attempts: u32,
    /// Last failure reason
    pub reason: String,
}

/// Errors from querying or patching the audio graph
#[derive(Error, Debug)]
pub enum GraphError {
    /// The graph tool binary is not installed
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The graph tool ran but reported failure
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// A port is not known to the graph
    #[error("No such port: {0}")]
    NoSuchPort(String),

    /// I/O error talking to the tool
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors parsing a `<client>:<port>` name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortParseError {
    /// No `:` separator
    #[error("Port name '{0}' must have the form <client>:<port>")]
    MissingSeparator(String),

    /// Client or port part is empty
    #[error("Port name '{0}' has an empty client or port part")]
    EmptyPart(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
