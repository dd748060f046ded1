//! PID file lifecycle (§4.9): refuse to start if another live process holds
//! the lock; clean up on drop.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use gigsignal_common::Error;

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Acquire the PID file at `path`. Fails with `Error::LockConflict` if
    /// the file exists and names a PID that is still alive.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();

        if let Some(existing_pid) = Self::read_live_pid(&path)? {
            return Err(Error::LockConflict(format!(
                "scheduler already running under pid {existing_pid} (lock file: {})",
                path.display()
            )));
        }

        let mut file = fs::File::create(&path).map_err(anyhow::Error::from)?;
        write!(file, "{}", std::process::id()).map_err(anyhow::Error::from)?;

        Ok(Self { path })
    }

    fn read_live_pid(path: &Path) -> Result<Option<u32>, Error> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Anyhow(anyhow::Error::from(e))),
        };

        let pid: u32 = match contents.trim().parse() {
            Ok(pid) => pid,
            Err(_) => return Ok(None), // corrupt lock file, treat as stale
        };

        if process_is_alive(pid) {
            Ok(Some(pid))
        } else {
            Ok(None)
        }
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // Signal 0 performs no action but still validates that the process
    // exists and is addressable.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_current_pid_and_cleans_up_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.pid");

        {
            let _lock = PidFile::acquire(&path).unwrap();
            let contents = fs::read_to_string(&path).unwrap();
            assert_eq!(contents.trim(), std::process::id().to_string());
        }

        assert!(!path.exists());
    }

    #[test]
    fn acquire_rejects_a_live_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.pid");

        let _first = PidFile::acquire(&path).unwrap();
        let second = PidFile::acquire(&path);
        assert!(second.is_err());
    }

    #[test]
    fn acquire_reclaims_a_stale_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.pid");
        fs::write(&path, "999999999").unwrap();

        let lock = PidFile::acquire(&path);
        assert!(lock.is_ok());
    }
}
