//! Child process handles
//!
//! Every process the launcher starts is wrapped in a [`ProcessHandle`]
//! that owns the tokio child, tracks its lifecycle state and knows how to
//! stop it gracefully.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use tsl_core::types::{ProcessRole, ProcessState};

/// What to run for one orchestrated process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    /// Part of the stack this process plays
    pub role: ProcessRole,
    /// Binary name or path
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Environment overrides on top of the inherited environment
    pub env: Vec<(String, String)>,
}

/// Find an executable by path or on `PATH`
///
/// Names containing `/` are taken as paths; bare names are searched for
/// in each `PATH` directory in order.
pub fn resolve_binary(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return is_executable(path).then(|| path.to_path_buf());
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A spawned, owned OS process
pub struct ProcessHandle {
    spec: ProcessSpec,
    child: Child,
    pid: Option<u32>,
    state: ProcessState,
    exit_status: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Resolve and spawn the process described by `spec`
    ///
    /// The child is killed if the handle is dropped without a shutdown, so
    /// an aborted launcher never leaves the audio device held.
    pub fn spawn(spec: ProcessSpec) -> io::Result<Self> {
        let program = resolve_binary(&spec.program).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' not found or not executable", spec.program),
            )
        })?;

        tracing::debug!("Spawning {} process: {:?} {:?}", spec.role, program, spec.args);

        let child = Command::new(&program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        tracing::info!("Started {} process {:?} (PID {:?})", spec.role, program, pid);

        Ok(Self {
            spec,
            child,
            pid,
            state: ProcessState::Live,
            exit_status: None,
        })
    }

    /// Role of this process
    pub fn role(&self) -> ProcessRole {
        self.spec.role
    }

    /// What was launched
    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// OS process ID, if the process was running when spawned
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Exit status, once known
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Advance the lifecycle state; terminated processes stay terminated
    pub fn set_state(&mut self, state: ProcessState) {
        if self.state != ProcessState::Terminated {
            self.state = state;
        }
    }

    /// Check for exit without blocking
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }
        let status = self.child.try_wait()?;
        if let Some(status) = status {
            self.mark_exited(status);
        }
        Ok(status)
    }

    /// Whether the process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Wait for the process to exit on its own
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.mark_exited(status);
        Ok(status)
    }

    /// Stop the process: SIGTERM, then SIGKILL once `grace` runs out
    pub async fn terminate(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        if let Some(status) = self.try_wait()? {
            return Ok(status);
        }

        tracing::debug!("Stopping {} process (PID {:?})", self.spec.role, self.pid);
        self.send_terminate()?;

        let status = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(
                    "{} process (PID {:?}) ignored SIGTERM for {:?}, killing",
                    self.spec.role,
                    self.pid,
                    grace
                );
                self.child.kill().await?;
                self.child.wait().await?
            }
        };

        self.mark_exited(status);
        Ok(status)
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) -> io::Result<()> {
        match self.pid {
            Some(pid) => {
                let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                if result == 0 {
                    Ok(())
                } else {
                    Err(io::Error::last_os_error())
                }
            }
            None => self.child.start_kill(),
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn mark_exited(&mut self, status: ExitStatus) {
        tracing::info!("{} process (PID {:?}) exited: {}", self.spec.role, self.pid, status);
        self.exit_status = Some(status);
        self.state = ProcessState::Terminated;
    }
}
