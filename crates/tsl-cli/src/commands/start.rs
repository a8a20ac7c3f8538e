//! Start command implementation

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output::{format_report, print_error, print_info, print_success, print_warning};
use tsl_core::config::LauncherConfig;
use tsl_core::pidfile::PidFileGuard;
use tsl_core::types::ProcessRole;
use tsl_orchestrator::{BufferSizeOutcome, ShutdownReason, StartupOrchestrator};

/// Launch options that override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Instrument layout name
    #[arg(short, long)]
    pub layout: Option<String>,

    /// Initial volume
    #[arg(long)]
    pub volume: Option<f32>,

    /// Start the instrument in developer mode
    #[arg(long)]
    pub dev_mode: bool,

    /// MIDI note the layout starts from
    #[arg(long, allow_negative_numbers = true)]
    pub pitch: Option<i32>,

    /// Enable MIDI output
    #[arg(long)]
    pub midi: bool,

    /// Audio server block size in frames
    #[arg(short, long)]
    pub buffer_size: Option<u32>,

    /// Do not write or check the PID file
    #[arg(long)]
    pub no_pid_file: bool,
}

impl StartArgs {
    /// Merge command-line options into `config`
    pub fn apply(&self, config: &mut LauncherConfig) {
        let launch = &mut config.launch;
        if let Some(layout) = &self.layout {
            launch.layout = Some(layout.clone());
        }
        if let Some(volume) = self.volume {
            launch.volume = Some(volume);
        }
        if let Some(pitch) = self.pitch {
            launch.pitch = Some(pitch);
        }
        if let Some(frames) = self.buffer_size {
            launch.buffer_size = Some(frames);
        }
        launch.dev_mode |= self.dev_mode;
        launch.midi |= self.midi;
    }
}

/// Bring the instrument up and supervise it until shutdown
pub async fn start_command(mut config: LauncherConfig, args: &StartArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let _pid_guard = if args.no_pid_file {
        None
    } else {
        Some(PidFileGuard::acquire(config.pid_file.clone(), std::process::id())?)
    };

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let mut orchestrator = StartupOrchestrator::with_jack_tools(config);

    let started = tokio::select! {
        result = orchestrator.start() => result,
        _ = cancel.cancelled() => {
            print_warning("Interrupted during startup");
            orchestrator.shutdown().await;
            return Ok(());
        }
    };

    let report = match started {
        Ok(report) => report,
        Err(e) => {
            print_error(&e.to_string());
            return Err(e.into());
        }
    };

    print_success("Instrument started");
    print!("{}", format_report(&report));
    for failure in &report.connections.failed {
        print_warning(&failure.to_string());
    }
    if let Some(BufferSizeOutcome::Failed { reason, .. }) = &report.buffer_size {
        print_warning(&format!("Buffer size not applied: {}", reason));
    }

    match orchestrator.run_until_shutdown(cancel).await {
        ShutdownReason::Cancelled => {
            print_info("Stopped");
            Ok(())
        }
        ShutdownReason::ProcessExited {
            role: ProcessRole::Client,
            status,
        } => {
            print_info(&format!("Instrument exited ({}), stopped audio server", status));
            Ok(())
        }
        ShutdownReason::ProcessExited { role, status } => {
            anyhow::bail!("{} process exited unexpectedly ({})", role, status)
        }
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, shutting down...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, shutting down...");
            }
        }

        cancel.cancel();
    });
}
