//! Top-level launcher configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_millis;
use super::{
    ClientConfig, EffectsConfig, JackToolsConfig, LaunchConfig, ReadinessConfig, RetryConfig,
    ServerConfig,
};
use crate::error::ConfigError;
use crate::types::ConnectionSpec;

/// Largest block size the JACK tools accept
const MAX_BUFFER_SIZE: u32 = 8192;

/// Configuration for one launcher run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Session bus address handed to every launched process and graph tool
    /// as `DBUS_SESSION_BUS_ADDRESS` (needed for audio device reservation)
    pub session_bus_address: Option<String>,

    /// PID file guarding against two launchers sharing the audio device
    pub pid_file: PathBuf,

    /// Time between SIGTERM and SIGKILL on shutdown
    #[serde(with = "duration_millis")]
    pub shutdown_grace: Duration,

    /// Options forwarded to the instrument
    pub launch: LaunchConfig,

    /// Audio server
    pub server: ServerConfig,

    /// Instrument application
    pub client: ClientConfig,

    /// Optional effects host
    pub effects: Option<EffectsConfig>,

    /// Readiness polling
    pub readiness: ReadinessConfig,

    /// Per-connection retry
    pub retry: RetryConfig,

    /// JACK tool paths
    pub jack_tools: JackToolsConfig,

    /// Port connections made once everything is up
    pub connections: Vec<ConnectionSpec>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        let server = ServerConfig::default();
        let connections = ["left-output", "right-output"]
            .iter()
            .zip(["playback_1", "playback_2"])
            .filter_map(|(out, playback)| {
                ConnectionSpec::new(
                    &format!("{}:{}", client.jack_name, out),
                    &format!("{}:{}", server.port_client, playback),
                )
                .ok()
            })
            .collect();

        Self {
            session_bus_address: None,
            pid_file: crate::pidfile::default_pid_path(),
            shutdown_grace: Duration::from_secs(3),
            launch: LaunchConfig {
                buffer_size: Some(256),
                ..Default::default()
            },
            server,
            client,
            effects: None,
            readiness: ReadinessConfig::default(),
            retry: RetryConfig::default(),
            jack_tools: JackToolsConfig::default(),
            connections,
        }
    }
}

impl LauncherConfig {
    /// Ports that must be registered before connecting
    ///
    /// Only the explicit `readiness.ports`. Connection endpoints are never
    /// waited for, so a misspelled port fails its own connection instead of
    /// the whole startup.
    pub fn required_ports(&self) -> Vec<String> {
        self.readiness.ports.clone()
    }

    /// JACK clients that must have registered ports before connecting
    ///
    /// The server's port client, the instrument, and the effects host's
    /// clients when one is configured.
    pub fn required_clients(&self) -> Vec<String> {
        let mut clients = vec![self.server.port_client.clone(), self.client.jack_name.clone()];
        if let Some(effects) = &self.effects {
            clients.extend(effects.jack_names.iter().cloned());
        }

        let mut distinct: Vec<String> = Vec::new();
        for client in clients {
            if !distinct.contains(&client) {
                distinct.push(client);
            }
        }
        distinct
    }

    /// Environment shared by every launched process
    pub fn shared_env(&self) -> Vec<(String, String)> {
        self.session_bus_address
            .iter()
            .map(|address| ("DBUS_SESSION_BUS_ADDRESS".to_string(), address.clone()))
            .collect()
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("server.binary is empty".to_string()));
        }
        if self.client.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("client.binary is empty".to_string()));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        if self.readiness.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "readiness.poll_interval must be non-zero".to_string(),
            ));
        }
        if self.readiness.timeout < self.readiness.poll_interval {
            return Err(ConfigError::Invalid(
                "readiness.timeout must be at least one poll_interval".to_string(),
            ));
        }
        if let Some(frames) = self.launch.buffer_size {
            if !frames.is_power_of_two() || frames > MAX_BUFFER_SIZE {
                return Err(ConfigError::Invalid(format!(
                    "buffer_size {} must be a power of two no larger than {}",
                    frames, MAX_BUFFER_SIZE
                )));
            }
        }
        Ok(())
    }
}
