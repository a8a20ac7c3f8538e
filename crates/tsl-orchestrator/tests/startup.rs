//! Startup sequence integration tests
//!
//! Real child processes (small shell scripts standing in for jackd and the
//! instrument) combined with an in-memory audio graph.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use tsl_core::config::{EffectsConfig, LauncherConfig};
use tsl_core::error::{GraphError, StartupError};
use tsl_core::traits::AudioGraph;
use tsl_core::types::{ConnectionSpec, PortEndpoint, ProcessRole, ProcessState};
use tsl_orchestrator::{BufferSizeOutcome, ShutdownReason, StartupOrchestrator};

const INSTRUMENT_PORTS: &[&str] = &[
    "system:capture_1",
    "system:playback_1",
    "system:playback_2",
    "touchscreen-instrument:left-output",
    "touchscreen-instrument:right-output",
];

/// In-memory graph recording every call
#[derive(Default)]
struct FakeGraph {
    ports: Vec<String>,
    ready_after: usize,
    listings: AtomicUsize,
    connects: Mutex<Vec<String>>,
    buffer_sizes: Mutex<Vec<u32>>,
    fail_bufsize: bool,
}

impl FakeGraph {
    fn with_ports(ports: &[&str]) -> Self {
        Self {
            ports: ports.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    fn buffer_sizes(&self) -> Vec<u32> {
        self.buffer_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioGraph for FakeGraph {
    async fn list_ports(&self) -> Result<Vec<String>, GraphError> {
        let n = self.listings.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.ready_after {
            Ok(self.ports.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn connect(
        &self,
        source: &PortEndpoint,
        destination: &PortEndpoint,
    ) -> Result<(), GraphError> {
        self.connects
            .lock()
            .unwrap()
            .push(format!("{} -> {}", source, destination));
        for port in [source, destination] {
            if !self.ports.contains(&port.full_name()) {
                return Err(GraphError::NoSuchPort(port.full_name()));
            }
        }
        Ok(())
    }

    async fn set_buffer_size(&self, frames: u32) -> Result<(), GraphError> {
        self.buffer_sizes.lock().unwrap().push(frames);
        if self.fail_bufsize {
            return Err(GraphError::ToolFailed {
                tool: "jack_bufsize".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "buffer size not supported".to_string(),
            });
        }
        Ok(())
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path: PathBuf = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

fn test_config(dir: &Path) -> LauncherConfig {
    let mut config = LauncherConfig::default();
    config.server.binary = write_script(dir, "jackd", "exec sleep 30");
    config.client.binary = write_script(dir, "instrument", "exec sleep 30");
    config.client.require_display = false;
    config.readiness.launch_grace = Duration::from_millis(50);
    config.readiness.poll_interval = Duration::from_millis(10);
    config.readiness.timeout = Duration::from_secs(2);
    config.retry.attempts = 1;
    config.shutdown_grace = Duration::from_secs(2);
    config.pid_file = dir.join("launcher.pid");
    config
}

async fn read_when_written(path: &Path) -> String {
    for _ in 0..100 {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if !contents.is_empty() {
                return contents;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{:?} was never written", path);
}

#[tokio::test]
async fn test_full_startup_connects_and_sets_buffer_size() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.launch.buffer_size = Some(512);

    let graph = Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS));
    let mut orchestrator = StartupOrchestrator::new(config, graph.clone());

    let report = orchestrator.start().await.unwrap();

    assert!(report.connections.is_complete());
    assert_eq!(report.connections.connected.len(), 2);
    assert_eq!(report.buffer_size, Some(BufferSizeOutcome::Applied(512)));
    assert_eq!(graph.buffer_sizes(), vec![512]);
    assert_eq!(
        orchestrator.process(ProcessRole::Client).unwrap().state(),
        ProcessState::Running
    );

    assert_eq!(
        orchestrator.shutdown().await,
        vec![ProcessRole::Client, ProcessRole::Server]
    );
    assert!(orchestrator.process(ProcessRole::Server).is_none());
}

#[tokio::test]
async fn test_client_receives_launch_flags_unchanged() {
    let dir = TempDir::new().unwrap();
    let args_log = dir.path().join("client-args");
    let mut config = test_config(dir.path());
    config.client.binary = write_script(
        dir.path(),
        "instrument",
        &format!(r#"echo "$@" > {}; exec sleep 30"#, args_log.display()),
    );
    config.launch.layout = Some("Parallelograms".to_string());
    config.launch.volume = Some(3.0);
    config.launch.dev_mode = true;

    let graph = Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS));
    let mut orchestrator = StartupOrchestrator::new(config, graph);
    orchestrator.start().await.unwrap();

    let logged = read_when_written(&args_log).await;
    assert_eq!(logged.trim(), "--layout Parallelograms --volume 3 --dev-mode");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_missing_server_binary_aborts_before_client() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("client-started");
    let mut config = test_config(dir.path());
    config.server.binary = dir.path().join("no-such-jackd").display().to_string();
    config.client.binary = write_script(
        dir.path(),
        "instrument",
        &format!("touch {}; exec sleep 30", marker.display()),
    );

    let graph = Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS));
    let mut orchestrator = StartupOrchestrator::new(config, graph.clone());

    let err = orchestrator.start().await.unwrap_err();
    assert!(matches!(err, StartupError::ServerLaunch(_)), "got {:?}", err);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!marker.exists());
    assert!(orchestrator.process(ProcessRole::Client).is_none());
    assert_eq!(graph.listings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_server_exiting_immediately_is_a_launch_failure() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.server.binary = write_script(
        dir.path(),
        "jackd",
        "echo 'ALSA: cannot open device hw:1' >&2; exit 1",
    );
    config.readiness.launch_grace = Duration::from_millis(300);

    let mut orchestrator =
        StartupOrchestrator::new(config, Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS)));

    match orchestrator.start().await {
        Err(StartupError::ServerLaunch(reason)) => assert!(reason.contains("exited during startup")),
        other => panic!("expected ServerLaunch, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_client_failure_stops_server() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.client.binary = "definitely-not-installed-instrument".to_string();

    let mut orchestrator =
        StartupOrchestrator::new(config, Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS)));

    let err = orchestrator.start().await.unwrap_err();
    assert!(matches!(err, StartupError::ClientLaunch(_)), "got {:?}", err);
    assert!(orchestrator.process(ProcessRole::Server).is_none());
}

#[tokio::test]
async fn test_misspelled_port_fails_alone() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.connections = vec![
        ConnectionSpec::new("touchscreen-instrument:left-output", "system:playbak_1").unwrap(),
        ConnectionSpec::new("touchscreen-instrument:right-output", "system:playback_2").unwrap(),
    ];
    config.launch.buffer_size = Some(512);

    let graph = Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS));
    let mut orchestrator = StartupOrchestrator::new(config, graph.clone());

    let report = orchestrator.start().await.unwrap();

    assert_eq!(report.connections.failed.len(), 1);
    assert_eq!(
        report.connections.failed[0].spec.destination.full_name(),
        "system:playbak_1"
    );
    assert_eq!(
        report.connections.connected,
        vec!["touchscreen-instrument:right-output -> system:playback_2"]
    );
    assert_eq!(graph.connects().len(), 2);
    assert_eq!(graph.buffer_sizes(), vec![512]);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_misspelled_source_port_fails_alone() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.connections = vec![
        ConnectionSpec::new("touchscreen-instrument:left-outptu", "system:playback_1").unwrap(),
        ConnectionSpec::new("touchscreen-instrument:right-output", "system:playback_2").unwrap(),
    ];

    let graph = Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS));
    let mut orchestrator = StartupOrchestrator::new(config, graph.clone());

    let report = orchestrator.start().await.unwrap();

    assert_eq!(report.connections.failed.len(), 1);
    assert_eq!(
        report.connections.failed[0].spec.source.full_name(),
        "touchscreen-instrument:left-outptu"
    );
    assert_eq!(
        report.connections.connected,
        vec!["touchscreen-instrument:right-output -> system:playback_2"]
    );
    assert_eq!(graph.connects().len(), 2);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_launches_nothing() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("server-started");
    let mut config = test_config(dir.path());
    config.server.binary = write_script(
        dir.path(),
        "jackd",
        &format!("touch {}; exec sleep 30", marker.display()),
    );
    config.launch.buffer_size = Some(300);

    let mut orchestrator =
        StartupOrchestrator::new(config, Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS)));

    let err = orchestrator.start().await.unwrap_err();
    assert!(matches!(err, StartupError::Config(_)), "got {:?}", err);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!marker.exists());
    assert!(orchestrator.process(ProcessRole::Server).is_none());
}

#[tokio::test]
async fn test_readiness_waits_for_ports() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let graph = Arc::new(FakeGraph {
        ready_after: 5,
        ..FakeGraph::with_ports(INSTRUMENT_PORTS)
    });
    let mut orchestrator = StartupOrchestrator::new(config, graph.clone());

    let report = orchestrator.start().await.unwrap();
    assert_eq!(report.readiness_polls, 6);
    assert_eq!(graph.listings.load(Ordering::SeqCst), 6);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_readiness_timeout_stops_everything() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.readiness.timeout = Duration::from_millis(200);

    let graph = Arc::new(FakeGraph::with_ports(&["system:playback_1", "system:playback_2"]));
    let mut orchestrator = StartupOrchestrator::new(config, graph.clone());

    match orchestrator.start().await {
        Err(StartupError::ReadinessTimeout { missing, .. }) => {
            assert_eq!(missing, vec!["touchscreen-instrument"])
        }
        other => panic!("expected ReadinessTimeout, got {:?}", other.map(|_| ())),
    }
    assert!(graph.connects().is_empty());
    assert!(orchestrator.process(ProcessRole::Server).is_none());
    assert!(orchestrator.process(ProcessRole::Client).is_none());
}

#[tokio::test]
async fn test_client_crash_during_readiness() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.client.binary = write_script(dir.path(), "instrument", "sleep 0.2; exit 101");

    let graph = Arc::new(FakeGraph::with_ports(&["system:playback_1"]));
    let mut orchestrator = StartupOrchestrator::new(config, graph);

    let err = orchestrator.start().await.unwrap_err();
    assert!(
        matches!(err, StartupError::ProcessExited { role: ProcessRole::Client, .. }),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_buffer_size_failure_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.launch.buffer_size = Some(64);

    let graph = Arc::new(FakeGraph {
        fail_bufsize: true,
        ..FakeGraph::with_ports(INSTRUMENT_PORTS)
    });
    let mut orchestrator = StartupOrchestrator::new(config, graph);

    let report = orchestrator.start().await.unwrap();
    assert!(matches!(
        report.buffer_size,
        Some(BufferSizeOutcome::Failed { frames: 64, .. })
    ));
    assert!(orchestrator.process(ProcessRole::Client).is_some());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_connection_to_dead_owner_not_attempted() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let graph = Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS));
    let mut orchestrator = StartupOrchestrator::new(config, graph.clone());

    // Only the server is running; the instrument's ports have no live owner
    orchestrator.launch_audio_server().await.unwrap();
    let specs = vec![
        ConnectionSpec::new("touchscreen-instrument:left-output", "system:playback_1").unwrap(),
        ConnectionSpec::new("other-app:out", "system:playback_2").unwrap(),
    ];
    let report = orchestrator.connect_ports(&specs).await;

    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].attempts, 0);
    // The foreign client was handed to the graph, which rejected it
    assert_eq!(graph.connects(), vec!["other-app:out -> system:playback_2"]);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_session_bus_address_reaches_server() {
    let dir = TempDir::new().unwrap();
    let env_log = dir.path().join("server-env");
    let mut config = test_config(dir.path());
    config.session_bus_address = Some("unix:path=/run/dbus/system_bus_socket".to_string());
    config.server.binary = write_script(
        dir.path(),
        "jackd",
        &format!(
            r#"echo "$DBUS_SESSION_BUS_ADDRESS" > {}; exec sleep 30"#,
            env_log.display()
        ),
    );

    let mut orchestrator =
        StartupOrchestrator::new(config, Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS)));
    orchestrator.launch_audio_server().await.unwrap();

    let logged = read_when_written(&env_log).await;
    assert_eq!(logged.trim(), "unix:path=/run/dbus/system_bus_socket");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_effects_host_launched_and_stopped_between() {
    let dir = TempDir::new().unwrap();
    let args_log = dir.path().join("effects-args");
    let mut config = test_config(dir.path());
    config.effects = Some(EffectsConfig {
        binary: write_script(
            dir.path(),
            "guitarix",
            &format!(r#"echo "$@" > {}; exec sleep 30"#, args_log.display()),
        ),
        ..Default::default()
    });
    config.connections.clear();
    config.readiness.ports = vec!["touchscreen-instrument:left-output".to_string()];

    let mut ports = INSTRUMENT_PORTS.to_vec();
    ports.extend(["gx_head_amp:in_0", "gx_head_fx:out_0", "gx_head_fx:out_1"]);
    let mut orchestrator =
        StartupOrchestrator::new(config, Arc::new(FakeGraph::with_ports(&ports)));
    orchestrator.start().await.unwrap();

    let logged = read_when_written(&args_log).await;
    assert!(logged.starts_with("--jack-input touchscreen-instrument:left-output"));

    assert_eq!(
        orchestrator.shutdown().await,
        vec![ProcessRole::Client, ProcessRole::Effects, ProcessRole::Server]
    );
}

#[tokio::test]
async fn test_run_until_cancelled() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let mut orchestrator =
        StartupOrchestrator::new(config, Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS)));
    orchestrator.start().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    assert_eq!(
        orchestrator.run_until_shutdown(cancel).await,
        ShutdownReason::Cancelled
    );
    assert!(orchestrator.process(ProcessRole::Client).is_none());
    assert!(orchestrator.process(ProcessRole::Server).is_none());
}

#[tokio::test]
async fn test_run_ends_when_client_exits() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.client.binary = write_script(dir.path(), "instrument", "sleep 0.5");

    let mut orchestrator =
        StartupOrchestrator::new(config, Arc::new(FakeGraph::with_ports(INSTRUMENT_PORTS)));
    orchestrator.start().await.unwrap();

    let reason = orchestrator.run_until_shutdown(CancellationToken::new()).await;
    assert!(
        matches!(reason, ShutdownReason::ProcessExited { role: ProcessRole::Client, .. }),
        "got {:?}",
        reason
    );
    assert!(orchestrator.process(ProcessRole::Server).is_none());
}
