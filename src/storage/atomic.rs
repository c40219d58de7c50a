//! All-or-nothing file replacement
//!
//! Content is written to a sibling temp file, synced, then renamed over the
//! target. Readers see either the old file or the new one, never a partial
//! write. Both files must live on the same filesystem for the rename to be
//! atomic, which holds because the temp file sits next to the target.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Sibling temp path used while staging `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("staged"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// A fully written temp file waiting to replace its target.
///
/// Dropping it without calling [`StagedFile::commit`] removes the temp file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    tmp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Write `contents` to the temp file for `target`, creating parent
    /// directories on demand.
    pub fn write(target: &Path, contents: &[u8]) -> io::Result<Self> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staged = Self {
            tmp_path: temp_path_for(target),
            target: target.to_path_buf(),
            committed: false,
        };

        // On error `staged` drops here and removes whatever was written
        let mut file = File::create(&staged.tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;

        Ok(staged)
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target.
    pub fn commit(mut self) -> io::Result<PathBuf> {
        fs::rename(&self.tmp_path, &self.target)?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.tmp_path.display(), error = %e, "Failed to remove staged temp file");
                }
            }
        }
    }
}

/// Replace `path` with `contents` atomically.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    StagedFile::write(path, contents)?.commit().map(|_| ())
}
