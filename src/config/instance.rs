//! Single-instance guard backed by a PID file.
//!
//! Two running copies would fight over the microphone and the output device,
//! so startup takes the lock before opening either.  A PID file left behind
//! by a crashed run is detected (the PID is no longer alive) and replaced.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("cannot write lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held for the lifetime of the process; removes the PID file on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock, replacing a stale PID file.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        Self::acquire_with(path, std::process::id(), pid_alive)
    }

    fn acquire_with<F>(path: &Path, own_pid: u32, alive: F) -> Result<Self, LockError>
    where
        F: Fn(u32) -> bool,
    {
        if let Ok(content) = std::fs::read_to_string(path) {
            match content.trim().parse::<u32>() {
                Ok(pid) if pid != own_pid && alive(pid) => {
                    return Err(LockError::AlreadyRunning(pid));
                }
                Ok(pid) => log::info!("instance: replacing stale lock file (pid {pid})"),
                Err(_) => log::warn!("instance: replacing unreadable lock file"),
            }
        }

        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, own_pid.to_string()).map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::debug!("instance: could not remove lock file: {e}");
        }
    }
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    std::process::Command::new("ps")
        .args(["-p", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    false
}
