//! Advisory lock over the package cache.
//!
//! Operations that write into the cache or rewrite `kcl.mod` / `kcl.mod.lock`
//! hold an exclusive lock on `<home>/.kpm.lock` for their whole duration, so
//! two kpm processes sharing a home never interleave writes.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use crate::util::fs::ensure_dir;

/// Lock file name inside the home directory.
pub const LOCK_FILE_NAME: &str = ".kpm.lock";

/// An exclusive lock on a home directory, released on drop.
#[derive(Debug)]
pub struct HomeLock {
    file: File,
    path: PathBuf,
}

impl HomeLock {
    /// Block until the exclusive lock for `home` is acquired.
    pub fn acquire(home: &Path) -> Result<Self> {
        ensure_dir(home)?;
        let path = home.join(LOCK_FILE_NAME);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open lock file: {}", path.display()))?;

        tracing::debug!("waiting for cache lock {}", path.display());
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("failed to lock {}", path.display()))?;
        tracing::debug!("acquired cache lock {}", path.display());

        Ok(HomeLock { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HomeLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release {}: {}", self.path.display(), e);
        }
    }
}
