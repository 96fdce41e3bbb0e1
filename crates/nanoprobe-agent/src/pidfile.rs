//! PID file handling: refuse to start a second instance, per spec.md §6
//! "Persisted state".

use std::path::{Path, PathBuf};

use crate::error::AgentError;

/// A PID file at a fixed path, written at startup and removed on clean
/// shutdown.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Checks `path` for an existing PID file naming a still-alive process
    /// (checked via `/proc/<pid>` on Linux), and if none is found, writes
    /// the current process's PID there.
    ///
    /// Fails with [`AgentError::AlreadyRunning`] if the recorded PID is
    /// alive.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let path = path.into();
        if let Some(existing) = read_pid(&path)? {
            if process_is_alive(existing) {
                return Err(AgentError::AlreadyRunning { pid: existing });
            }
            tracing::warn!(pid = existing, "removing stale PID file from a process that is no longer running");
        }
        std::fs::write(&path, std::process::id().to_string())
            .map_err(|source| AgentError::Io { path: path.display().to_string(), source })?;
        Ok(PidFile { path })
    }

    /// Removes the PID file. Called on graceful shutdown; a PID file left
    /// behind after a crash is exactly the "stale" case
    /// [`PidFile::acquire`] tolerates on the next start.
    pub fn release(self) -> Result<(), AgentError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AgentError::Io { path: self.path.display().to_string(), source }),
        }
    }
}

fn read_pid(path: &Path) -> Result<Option<u32>, AgentError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text.trim().parse().ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(AgentError::Io { path: path.display().to_string(), source }),
    }
}

#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    // Conservative fallback off Linux: assume alive rather than risk two
    // instances racing on the same state.
    true
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn acquire_writes_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        let pidfile = PidFile::acquire(&path).unwrap();
        let written: u32 = std::fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_eq!(written, std::process::id());
        pidfile.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn stale_pid_file_from_dead_process_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        // PID 1 is init on Linux and therefore alive, so use an
        // implausibly large PID unlikely to be assigned.
        std::fs::write(&path, "4194304").unwrap();
        let pidfile = PidFile::acquire(&path).unwrap();
        pidfile.release().unwrap();
    }
}
