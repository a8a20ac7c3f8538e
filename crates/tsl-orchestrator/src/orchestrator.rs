//! Startup orchestration
//!
//! [`StartupOrchestrator`] owns every process it launches. The startup
//! sequence is strictly ordered:
//!
//! 1. launch the audio server
//! 2. launch the instrument client (and the effects host, if configured)
//! 3. poll the audio graph until every launched client has registered ports
//! 4. patch the configured connections, best effort
//! 5. apply the buffer size
//!
//! Launch and readiness failures abort the sequence and stop whatever was
//! already started. Connection and buffer-size failures are reported in the
//! [`StartupReport`] and leave the instrument running.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use tsl_core::config::{ClientConfig, LaunchConfig, LauncherConfig};
use tsl_core::error::{GraphError, StartupError};
use tsl_core::traits::AudioGraph;
use tsl_core::types::{ConnectionSpec, ProcessRole, ProcessState};

use crate::connect::{connect_all, ConnectionReport};
use crate::graph::JackTools;
use crate::process::{ProcessHandle, ProcessSpec};
use crate::readiness::{wait_for_ports, ReadinessTarget};

/// Result of applying the buffer size
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSizeOutcome {
    /// Server accepted the block size
    Applied(u32),
    /// Server kept its previous block size
    Failed { frames: u32, reason: String },
}

/// What a completed startup did
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    /// Port listings made before everything was ready
    pub readiness_polls: usize,
    /// Connections made and failed
    pub connections: ConnectionReport,
    /// Buffer size outcome, when one was configured
    pub buffer_size: Option<BufferSizeOutcome>,
}

/// Why supervision ended
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// The cancellation token fired (signal or caller)
    Cancelled,
    /// An orchestrated process exited on its own
    ProcessExited { role: ProcessRole, status: String },
}

/// Launches, patches and stops the instrument's processes
pub struct StartupOrchestrator {
    config: LauncherConfig,
    graph: Arc<dyn AudioGraph>,
    server: Option<ProcessHandle>,
    client: Option<ProcessHandle>,
    effects: Option<ProcessHandle>,
}

impl StartupOrchestrator {
    /// Create an orchestrator over an arbitrary audio graph
    pub fn new(config: LauncherConfig, graph: Arc<dyn AudioGraph>) -> Self {
        Self {
            config,
            graph,
            server: None,
            client: None,
            effects: None,
        }
    }

    /// Create an orchestrator that drives the JACK command-line tools
    pub fn with_jack_tools(config: LauncherConfig) -> Self {
        let graph = Arc::new(JackTools::from_config(&config));
        Self::new(config, graph)
    }

    /// Active configuration
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Handle for a launched process
    pub fn process(&self, role: ProcessRole) -> Option<&ProcessHandle> {
        match role {
            ProcessRole::Server => self.server.as_ref(),
            ProcessRole::Client => self.client.as_ref(),
            ProcessRole::Effects => self.effects.as_ref(),
        }
    }

    fn process_mut(&mut self, role: ProcessRole) -> Option<&mut ProcessHandle> {
        match role {
            ProcessRole::Server => self.server.as_mut(),
            ProcessRole::Client => self.client.as_mut(),
            ProcessRole::Effects => self.effects.as_mut(),
        }
    }

    /// Run the full startup sequence
    ///
    /// The configuration is validated first. On a fatal error every process
    /// started so far is stopped before the error is returned.
    pub async fn start(&mut self) -> Result<StartupReport, StartupError> {
        match self.run_startup().await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Startup failed: {}", e);
                self.shutdown().await;
                Err(e)
            }
        }
    }

    async fn run_startup(&mut self) -> Result<StartupReport, StartupError> {
        self.config.validate()?;
        self.launch_audio_server().await?;

        let client = self.config.client.binary.clone();
        let launch = self.config.launch.clone();
        self.launch_client(&client, &launch).await?;

        if self.config.effects.is_some() {
            self.launch_effects().await?;
        }

        let readiness_polls = self.await_readiness(self.config.readiness.timeout).await?;

        let specs = self.config.connections.clone();
        let connections = self.connect_ports(&specs).await;

        let buffer_size = match launch.buffer_size {
            Some(frames) => Some(match self.set_buffer_size(frames).await {
                Ok(()) => BufferSizeOutcome::Applied(frames),
                Err(e) => {
                    tracing::warn!("Could not set buffer size to {}: {}", frames, e);
                    BufferSizeOutcome::Failed {
                        frames,
                        reason: e.to_string(),
                    }
                }
            }),
            None => None,
        };

        for handle in self.handles_mut() {
            handle.set_state(ProcessState::Running);
        }

        tracing::info!(
            "Startup complete: {}/{} connections made",
            connections.connected.len(),
            connections.attempted()
        );

        Ok(StartupReport {
            readiness_polls,
            connections,
            buffer_size,
        })
    }

    /// Start the audio server in the background
    pub async fn launch_audio_server(&mut self) -> Result<&ProcessHandle, StartupError> {
        let server = &self.config.server;
        let mut env = self.config.shared_env();
        env.extend(server.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let spec = ProcessSpec {
            role: ProcessRole::Server,
            program: server.binary.clone(),
            args: server.to_args(),
            env,
        };

        let handle = self
            .spawn_and_settle(spec)
            .await
            .map_err(StartupError::ServerLaunch)?;
        Ok(self.server.insert(handle))
    }

    /// Start the instrument with the given launch options
    pub async fn launch_client(
        &mut self,
        binary: &str,
        launch: &LaunchConfig,
    ) -> Result<&ProcessHandle, StartupError> {
        let spec = client_spec(
            &self.config.client,
            binary,
            launch,
            self.config.shared_env(),
            inherited_display(),
        )
        .map_err(StartupError::ClientLaunch)?;

        let handle = self
            .spawn_and_settle(spec)
            .await
            .map_err(StartupError::ClientLaunch)?;
        Ok(self.client.insert(handle))
    }

    /// Start the effects host, when one is configured
    pub async fn launch_effects(&mut self) -> Result<Option<&ProcessHandle>, StartupError> {
        let Some(effects) = &self.config.effects else {
            return Ok(None);
        };

        let spec = ProcessSpec {
            role: ProcessRole::Effects,
            program: effects.binary.clone(),
            args: effects.to_args(),
            env: self.config.shared_env(),
        };

        let handle = self
            .spawn_and_settle(spec)
            .await
            .map_err(StartupError::EffectsLaunch)?;
        Ok(Some(self.effects.insert(handle)))
    }

    /// Spawn a process and make sure it survives the launch grace period
    async fn spawn_and_settle(&self, spec: ProcessSpec) -> Result<ProcessHandle, String> {
        let program = spec.program.clone();
        let mut handle = ProcessHandle::spawn(spec).map_err(|e| format!("{}: {}", program, e))?;

        tokio::time::sleep(self.config.readiness.launch_grace).await;
        match handle.try_wait() {
            Ok(None) => Ok(handle),
            Ok(Some(status)) => Err(format!("{} exited during startup ({})", program, status)),
            Err(e) => Err(format!("{}: {}", program, e)),
        }
    }

    /// Poll until every orchestrated client has registered its ports
    ///
    /// Returns the number of polls. Fails early if an orchestrated process
    /// exits while waiting.
    pub async fn await_readiness(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<usize, StartupError> {
        let graph = Arc::clone(&self.graph);
        let target = ReadinessTarget {
            ports: self.config.required_ports(),
            clients: self.config.required_clients(),
        };
        let poll_interval = self.config.readiness.poll_interval;

        tracing::info!("Waiting up to {:?} for {}", timeout, target.all().join(", "));
        wait_for_ports(graph.as_ref(), &target, timeout, poll_interval, || {
            self.check_alive()
        })
        .await
    }

    fn check_alive(&mut self) -> Result<(), StartupError> {
        for handle in self.handles_mut() {
            if let Some(status) = handle.try_wait()? {
                return Err(StartupError::ProcessExited {
                    role: handle.role(),
                    status: status.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Patch each connection in order; failures are isolated per spec
    pub async fn connect_ports(&mut self, specs: &[ConnectionSpec]) -> ConnectionReport {
        let graph = Arc::clone(&self.graph);
        let retry = self.config.retry.clone();

        let report = connect_all(graph.as_ref(), specs, &retry, |spec| {
            self.check_endpoints_live(spec)
        })
        .await;

        if !report.connected.is_empty() {
            for handle in self.handles_mut() {
                handle.set_state(ProcessState::Connected);
            }
        }
        report
    }

    /// Ports owned by an orchestrated process need that process alive.
    /// Ports of foreign clients are left to the graph to validate.
    fn check_endpoints_live(&mut self, spec: &ConnectionSpec) -> Result<(), String> {
        for endpoint in spec.endpoints() {
            let Some(role) = self.owner_of(&endpoint.client) else {
                continue;
            };
            let alive = self
                .process_mut(role)
                .map(|handle| handle.is_alive())
                .unwrap_or(false);
            if !alive {
                return Err(format!(
                    "{} is owned by the {} process, which is not running",
                    endpoint, role
                ));
            }
        }
        Ok(())
    }

    fn owner_of(&self, client_name: &str) -> Option<ProcessRole> {
        if client_name == self.config.server.port_client {
            Some(ProcessRole::Server)
        } else if client_name == self.config.client.jack_name {
            Some(ProcessRole::Client)
        } else if self
            .config
            .effects
            .as_ref()
            .is_some_and(|fx| fx.jack_names.iter().any(|name| name == client_name))
        {
            Some(ProcessRole::Effects)
        } else {
            None
        }
    }

    /// Apply the server-wide block size
    pub async fn set_buffer_size(&self, frames: u32) -> Result<(), GraphError> {
        tracing::info!("Setting buffer size to {} frames", frames);
        self.graph.set_buffer_size(frames).await
    }

    /// Wait until `cancel` fires or any process exits, then shut down
    ///
    /// Exited processes are not restarted.
    pub async fn run_until_shutdown(&mut self, cancel: CancellationToken) -> ShutdownReason {
        let reason = tokio::select! {
            _ = cancel.cancelled() => ShutdownReason::Cancelled,
            exited = wait_exit(self.server.as_mut()) => exited,
            exited = wait_exit(self.client.as_mut()) => exited,
            exited = wait_exit(self.effects.as_mut()) => exited,
        };

        match &reason {
            ShutdownReason::Cancelled => tracing::info!("Shutdown requested"),
            ShutdownReason::ProcessExited { role, status } => {
                tracing::warn!("{} process exited ({}), shutting down", role, status)
            }
        }

        self.shutdown().await;
        reason
    }

    /// Stop the client, then the effects host, then the server
    ///
    /// Returns the roles stopped, in order. Safe to call repeatedly.
    pub async fn shutdown(&mut self) -> Vec<ProcessRole> {
        let grace = self.config.shutdown_grace;
        let mut stopped = Vec::new();

        for slot in [&mut self.client, &mut self.effects, &mut self.server] {
            if let Some(mut handle) = slot.take() {
                let role = handle.role();
                if let Err(e) = handle.terminate(grace).await {
                    tracing::warn!("Failed to stop {} process: {}", role, e);
                }
                stopped.push(role);
            }
        }

        if !stopped.is_empty() {
            tracing::info!("Stopped processes: {:?}", stopped);
        }
        stopped
    }

    fn handles_mut(&mut self) -> impl Iterator<Item = &mut ProcessHandle> {
        [
            self.server.as_mut(),
            self.client.as_mut(),
            self.effects.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

async fn wait_exit(handle: Option<&mut ProcessHandle>) -> ShutdownReason {
    match handle {
        Some(handle) => {
            let status = match handle.wait().await {
                Ok(status) => status.to_string(),
                Err(e) => e.to_string(),
            };
            ShutdownReason::ProcessExited {
                role: handle.role(),
                status,
            }
        }
        None => std::future::pending().await,
    }
}

fn inherited_display() -> Option<String> {
    std::env::var("DISPLAY")
        .ok()
        .or_else(|| std::env::var("WAYLAND_DISPLAY").ok())
        .filter(|display| !display.is_empty())
}

/// Build the client invocation
///
/// Launch flags come first and are forwarded verbatim. `DISPLAY` is set
/// explicitly when configured; otherwise the inherited display is used,
/// and its absence is an error when a display is required.
pub fn client_spec(
    client: &ClientConfig,
    binary: &str,
    launch: &LaunchConfig,
    shared_env: Vec<(String, String)>,
    inherited_display: Option<String>,
) -> Result<ProcessSpec, String> {
    let mut env = shared_env;
    match (&client.display, inherited_display) {
        (Some(display), _) => env.push(("DISPLAY".to_string(), display.clone())),
        (None, Some(_)) => {}
        (None, None) if client.require_display => {
            return Err(
                "no display available: set client.display or DISPLAY, or disable client.require_display"
                    .to_string(),
            );
        }
        (None, None) => tracing::debug!("Starting client without a display"),
    }
    env.extend(client.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut args = launch.to_args();
    args.extend(client.extra_args.iter().cloned());

    Ok(ProcessSpec {
        role: ProcessRole::Client,
        program: binary.to_string(),
        args,
        env,
    })
}
