//! Data Directory Lock
//!
//! One service instance per data directory. Two instances sharing a baseline
//! file would each hold their own in-process lock and race on the
//! read-classify-persist sequence, so startup refuses a directory that is
//! already owned by a live process.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("data directory {dir:?} is locked by running instance (PID {pid}); stop it or remove {lock:?}")]
    Held { dir: PathBuf, lock: PathBuf, pid: u32 },

    #[error("lock file I/O error at {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
}

/// PID lock file held for the lifetime of the process.
#[derive(Debug)]
pub struct DataDirLock {
    lock_path: PathBuf,
    owned: bool,
}

impl DataDirLock {
    const LOCK_FILE_NAME: &'static str = ".mileage-watch.lock";

    /// Take the lock for `data_dir`, creating the directory if needed.
    ///
    /// A lock left behind by a dead process is replaced.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self, LockError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(|e| LockError::Io(data_dir.to_path_buf(), e))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);

        if let Some(pid) = Self::holder(&lock_path) {
            if Self::is_process_running(pid) {
                return Err(LockError::Held {
                    dir: data_dir.to_path_buf(),
                    lock: lock_path,
                    pid,
                });
            }
            tracing::info!(pid, "Removing stale data directory lock");
        }

        let pid = std::process::id();
        let mut file = File::create(&lock_path).map_err(|e| LockError::Io(lock_path.clone(), e))?;
        writeln!(file, "{pid}").map_err(|e| LockError::Io(lock_path.clone(), e))?;

        tracing::debug!(pid, path = %lock_path.display(), "Acquired data directory lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// PID recorded in an existing lock file, `None` if absent or unreadable.
    fn holder(lock_path: &Path) -> Option<u32> {
        let contents = fs::read_to_string(lock_path).ok()?;
        match contents.trim().parse() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(path = %lock_path.display(), error = %e, "Unparseable lock file, treating as stale");
                None
            }
        }
    }

    #[cfg(unix)]
    fn is_process_running(pid: u32) -> bool {
        // The PID alone may have been recycled; require our binary name
        fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .map(|cmdline| cmdline.contains("mileage-watch") || cmdline.contains("mileage_watch"))
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_process_running(_pid: u32) -> bool {
        true
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Release the lock (called automatically on drop)
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!("Failed to remove lock file: {}", e);
            }
            self.owned = false;
        }
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        self.release();
    }
}
