//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PortParseError;

/// Whether a port consumes or produces audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Receives audio (e.g. `system:playback_1`)
    Input,
    /// Produces audio (e.g. `touchscreen-instrument:left-output`)
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// A named audio port exposed by a running process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortEndpoint {
    /// Name of the owning audio client (`system`, `touchscreen-instrument`, ...)
    pub client: String,
    /// Channel label within the client (`playback_1`, `left-output`, ...)
    pub port: String,
    /// Input or output
    pub direction: PortDirection,
}

impl PortEndpoint {
    /// Create an endpoint from its parts
    pub fn new(client: impl Into<String>, port: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            client: client.into(),
            port: port.into(),
            direction,
        }
    }

    /// Parse a `<client>:<port>` name
    ///
    /// Only the first `:` separates the client; port labels may contain
    /// further colons.
    pub fn parse(name: &str, direction: PortDirection) -> Result<Self, PortParseError> {
        let (client, port) = name
            .split_once(':')
            .ok_or_else(|| PortParseError::MissingSeparator(name.to_string()))?;
        let (client, port) = (client.trim(), port.trim());
        if client.is_empty() || port.is_empty() {
            return Err(PortParseError::EmptyPart(name.to_string()));
        }
        Ok(Self::new(client, port, direction))
    }

    /// Full `<client>:<port>` name as the audio graph reports it
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.client, self.port)
    }
}

impl fmt::Display for PortEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client, self.port)
    }
}

/// An ordered (source, destination) pair to patch together
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawConnectionSpec", into = "RawConnectionSpec")]
pub struct ConnectionSpec {
    /// Output port audio flows from
    pub source: PortEndpoint,
    /// Input port audio flows into
    pub destination: PortEndpoint,
}

impl ConnectionSpec {
    /// Build a spec from two `<client>:<port>` names
    pub fn new(source: &str, destination: &str) -> Result<Self, PortParseError> {
        Ok(Self {
            source: PortEndpoint::parse(source, PortDirection::Output)?,
            destination: PortEndpoint::parse(destination, PortDirection::Input)?,
        })
    }

    /// Both endpoints, source first
    pub fn endpoints(&self) -> [&PortEndpoint; 2] {
        [&self.source, &self.destination]
    }
}

impl fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

impl FromStr for ConnectionSpec {
    type Err = PortParseError;

    /// Parse `<client>:<port> -> <client>:<port>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, destination) = s
            .split_once("->")
            .ok_or_else(|| PortParseError::MissingSeparator(s.to_string()))?;
        Self::new(source.trim(), destination.trim())
    }
}

/// On-disk form of a connection: two port name strings
#[derive(Serialize, Deserialize)]
struct RawConnectionSpec {
    source: String,
    destination: String,
}

impl TryFrom<RawConnectionSpec> for ConnectionSpec {
    type Error = PortParseError;

    fn try_from(raw: RawConnectionSpec) -> Result<Self, Self::Error> {
        Self::new(&raw.source, &raw.destination)
    }
}

impl From<ConnectionSpec> for RawConnectionSpec {
    fn from(spec: ConnectionSpec) -> Self {
        Self {
            source: spec.source.full_name(),
            destination: spec.destination.full_name(),
        }
    }
}

/// Which part of the instrument stack a process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    /// The audio server (jackd)
    Server,
    /// The touchscreen instrument application
    Client,
    /// Optional effects host (guitarix)
    Effects,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Server => write!(f, "server"),
            ProcessRole::Client => write!(f, "client"),
            ProcessRole::Effects => write!(f, "effects"),
        }
    }
}

/// Lifecycle of an orchestrated process
///
/// `Live -> Connected -> Running -> Terminated`; any state may jump
/// straight to `Terminated` when the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Spawned and not yet patched
    Live,
    /// Its ports have been patched
    Connected,
    /// Startup finished
    Running,
    /// Exited or killed
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Live => write!(f, "live"),
            ProcessState::Connected => write!(f, "connected"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Terminated => write!(f, "terminated"),
        }
    }
}
