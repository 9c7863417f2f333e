//! Exclusive access to the host's registration state.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOCK_FILE_NAME: &str = ".lock";

/// Advisory lock on `<registration_dir>/.lock`, released on drop.
#[derive(Debug)]
pub struct RegistrationLock {
    path: PathBuf,
    _file: File,
}

impl RegistrationLock {
    /// Take the lock without blocking. A lock held by another process is
    /// reported as [`Error::LockHeld`] with the owner's PID when known.
    pub fn acquire(registration_dir: &Path) -> Result<Self> {
        fs::create_dir_all(registration_dir).map_err(|e| {
            Error::Filesystem(format!(
                "Failed to create {}: {}",
                registration_dir.display(),
                e
            ))
        })?;

        let path = registration_dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Filesystem(format!("Failed to open lock file: {}", e)))?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            debug!("Lock acquisition failed: {} (kind: {:?})", e, e.kind());
            let pid = fs::read_to_string(&path)
                .ok()
                .and_then(|contents| contents.trim().parse::<u32>().ok());
            return Err(Error::LockHeld { pid });
        }

        // Owner PID for diagnostics only
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());
        debug!("Acquired advisory lock on {:?}", path);

        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
