//! PID file utilities for single-instance management
//!
//! Only one launcher may own the audio device at a time. The PID file
//! records the running launcher so a second one can refuse to start.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config;
use crate::error::StartupError;

/// Default PID file name
const PID_FILE_NAME: &str = "launcher.pid";

/// Times to try claiming the PID file before giving up
const CLAIM_ATTEMPTS: usize = 3;

/// How long to wait for a fresh claim to get its PID written
const CLAIM_SETTLE: Duration = Duration::from_millis(10);
const CLAIM_SETTLE_RETRIES: usize = 10;

/// Get the default PID file path
pub fn default_pid_path() -> PathBuf {
    config::default_config_dir().join(PID_FILE_NAME)
}

/// Read the PID from the PID file
///
/// Returns `Ok(Some(pid))` if the file exists and contains a valid PID,
/// `Ok(None)` if the file doesn't exist, or an error if the file is malformed.
pub fn read_pid_file(path: &Path) -> io::Result<Option<u32>> {
    match fs::File::open(path) {
        Ok(mut file) => {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let pid = contents
                .trim()
                .parse::<u32>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(Some(pid))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write a PID to the PID file, creating parent directories
pub fn write_pid_file(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(path)?;
    writeln!(file, "{}", pid)?;
    Ok(())
}

/// Remove the PID file
///
/// Returns `Ok(())` even if the file doesn't exist.
pub fn remove_pid_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Check if a process with the given PID is still alive
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) probes without signalling; EPERM still means the process exists
    unsafe {
        let result = libc::kill(pid as libc::pid_t, 0);
        if result == 0 {
            return true;
        }
        let err = std::io::Error::last_os_error();
        err.raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    false
}

/// Guard that removes the PID file when dropped
pub struct PidFileGuard {
    path: PathBuf,
}

impl PidFileGuard {
    /// Claim the PID file for `pid`
    ///
    /// The file is created exclusively, so of two launchers starting at the
    /// same time only one wins. Fails with [`StartupError::AlreadyRunning`]
    /// when the file names another live process. Stale or unreadable files
    /// are replaced.
    pub fn acquire(path: PathBuf, pid: u32) -> Result<Self, StartupError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        for _ in 0..CLAIM_ATTEMPTS {
            match claim_pid_file(&path, pid) {
                Ok(()) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            match read_claimed_pid(&path) {
                Ok(Some(existing)) if existing != pid && is_process_alive(existing) => {
                    return Err(StartupError::AlreadyRunning(existing));
                }
                Ok(Some(existing)) => {
                    tracing::debug!("Replacing stale PID file {:?} (PID {})", path, existing);
                }
                // Removed between our claim and read; claim again
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Replacing unreadable PID file {:?}: {}", path, e);
                }
            }
            remove_pid_file(&path)?;
        }

        Err(StartupError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("could not claim PID file {:?}", path),
        )))
    }

    /// Path this guard owns
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Create the PID file, failing if it already exists
fn claim_pid_file(path: &Path, pid: u32) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    writeln!(file, "{}", pid)?;
    Ok(())
}

/// Read a PID file another launcher may have only just created
///
/// An empty file is a claim whose PID is still being written.
fn read_claimed_pid(path: &Path) -> io::Result<Option<u32>> {
    for _ in 0..CLAIM_SETTLE_RETRIES {
        match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => std::thread::sleep(CLAIM_SETTLE),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        }
    }
    read_pid_file(path)
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_pid_file(&self.path) {
            tracing::warn!("Failed to remove PID file {:?}: {}", self.path, e);
        }
    }
}
