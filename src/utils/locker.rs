//! File-based locking to prevent two runs writing the same backup tree

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the lock file created inside the output directory
pub const LOCK_FILE_NAME: &str = ".juju-backup-all.lock";

/// Lock on an output directory
///
/// Open it with [`OutputLock::open`], then hold the guard returned by
/// [`OutputLock::try_acquire`] for as long as the tree is being written.
pub struct OutputLock {
    lock: RwLock<File>,
    lock_path: PathBuf,
}

impl OutputLock {
    /// Open (or create) the lock file for an output directory
    pub fn open(output_dir: &Path) -> Result<Self> {
        let lock_path = output_dir.join(LOCK_FILE_NAME);
        debug!("Opening lock file: {:?}", lock_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        Ok(Self {
            lock: RwLock::new(file),
            lock_path,
        })
    }

    /// Take the exclusive lock, failing immediately if another run holds it
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        let path = self.lock_path.clone();
        let guard = self.lock.try_write().with_context(|| {
            format!(
                "Another backup run is writing to this directory (lock held: {:?})",
                path
            )
        })?;
        info!("Acquired output lock: {:?}", path);
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}
