//! Single-instance bookkeeping for the long-running capture process
//!
//! `pastebox start` records its PID in a pidfile; `pastebox stop` and
//! `pastebox status` read it back and signal the process.

use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{error, info};

const PIDFILE_NAME: &str = "pastebox.pid";

/// Pidfile of a running capture process
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Per-user pidfile location
    pub fn default_location() -> Result<Self> {
        if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
            return Ok(Self::new(PathBuf::from(runtime_dir).join(PIDFILE_NAME)));
        }

        let uid = nix::unistd::getuid();
        let var_run_user = PathBuf::from(format!("/var/run/user/{}", uid));
        if var_run_user.exists() {
            return Ok(Self::new(var_run_user.join(PIDFILE_NAME)));
        }

        let base = dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("run")))
            .ok_or_else(|| anyhow!("Could not determine a directory for the pidfile"))?;
        Ok(Self::new(base.join("pastebox").join(PIDFILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `pid`, readable only by the owner
    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create pidfile directory")?;
        }

        let mut file = File::create(&self.path)
            .with_context(|| format!("Failed to create pidfile: {:?}", self.path))?;
        write!(file, "{}", pid)?;
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;

        info!("Wrote PID {} to {:?}", pid, self.path);
        Ok(())
    }

    pub fn read(&self) -> Result<Option<u32>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let pid = contents
            .trim()
            .parse::<u32>()
            .with_context(|| format!("Invalid PID in pidfile: {}", contents))?;
        Ok(Some(pid))
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove pidfile: {:?}", self.path))?;
            info!("Removed pidfile: {:?}", self.path);
        }
        Ok(())
    }

    /// PID of a live process, clearing a stale pidfile
    pub fn running_pid(&self) -> Result<Option<u32>> {
        match self.read()? {
            Some(pid) if is_process_running(pid) => Ok(Some(pid)),
            Some(pid) => {
                info!("Found stale pidfile for PID {}, removing", pid);
                self.remove()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Claim the pidfile for this process, failing if another instance runs
    pub fn acquire(self) -> Result<PidGuard> {
        if let Some(pid) = self.running_pid()? {
            return Err(anyhow!("PasteBox is already running (PID {})", pid));
        }
        self.write(std::process::id())?;
        Ok(PidGuard { pidfile: self })
    }

    /// Ask the running instance to exit, escalating to SIGKILL after a second
    pub fn stop(&self) -> Result<bool> {
        let Some(pid) = self.running_pid()? else {
            info!("PasteBox is not running");
            return Ok(false);
        };

        info!("Sending SIGTERM to PID {}", pid);
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM)?;

        for _ in 0..10 {
            std::thread::sleep(Duration::from_millis(100));
            if !is_process_running(pid) {
                info!("PasteBox stopped");
                self.remove()?;
                return Ok(true);
            }
        }

        error!("Process did not stop gracefully, sending SIGKILL");
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL)?;
        std::thread::sleep(Duration::from_millis(100));
        if is_process_running(pid) {
            return Err(anyhow!("Failed to stop PID {}", pid));
        }
        self.remove()?;
        Ok(true)
    }
}

/// Removes the pidfile when dropped
#[derive(Debug)]
pub struct PidGuard {
    pidfile: PidFile,
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        if let Err(e) = self.pidfile.remove() {
            error!("Failed to remove pidfile: {}", e);
        }
    }
}

/// Check if a process with the given PID exists
pub fn is_process_running(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Resolve when Ctrl-C or SIGTERM arrives
pub async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Received Ctrl-C, shutting down");
        }
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let pidfile = PidFile::new(dir.path().join("run").join(PIDFILE_NAME));

        assert_eq!(pidfile.read().unwrap(), None);
        pidfile.write(4242).unwrap();
        assert_eq!(pidfile.read().unwrap(), Some(4242));

        let mode = fs::metadata(pidfile.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        pidfile.remove().unwrap();
        assert!(!pidfile.path().exists());
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PIDFILE_NAME);

        let guard = PidFile::new(&path).acquire().unwrap();
        assert_eq!(PidFile::new(&path).running_pid().unwrap(), Some(std::process::id()));
        assert!(PidFile::new(&path).acquire().is_err());

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_pidfile() {
        let dir = TempDir::new().unwrap();
        let pidfile = PidFile::new(dir.path().join(PIDFILE_NAME));
        fs::write(pidfile.path(), "not a pid").unwrap();
        assert!(pidfile.read().is_err());
    }

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }
}
