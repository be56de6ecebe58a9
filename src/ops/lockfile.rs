//! Lock file reconciliation and persistence.

use std::path::Path;

use anyhow::Result;

use crate::resolver::encode::{LockEntry, LockFile};
use crate::resolver::errors::ResolveError;
use crate::resolver::Resolve;
use crate::util::fs::StagedFile;

/// Merge a fresh resolution into the existing lock file.
///
/// Every resolved package is written under its name; entries for names the
/// resolution did not produce are carried through untouched. With `locked`,
/// a resolved package whose source differs from its locked one is a
/// [`ResolveError::LockConflict`].
pub fn reconcile(mut lock: LockFile, resolve: &Resolve, locked: bool) -> Result<LockFile> {
    for pkg in resolve.packages() {
        let entry = LockEntry::from(pkg);

        if locked {
            if let Some(existing) = lock.entry(&entry.name)? {
                if existing.source != entry.source {
                    return Err(ResolveError::LockConflict {
                        name: entry.name,
                        locked: existing.source.to_url_string(),
                        resolved: entry.source.to_url_string(),
                    }
                    .into());
                }
            }
        }

        if lock.set_entry(&entry)? {
            tracing::debug!("locking {} {}", entry.name, entry.version);
        }
    }

    Ok(lock)
}

/// Write the lock file (when it changed) and then the manifest.
///
/// Both files are staged before either is replaced. If the manifest cannot be
/// replaced, the lock file is put back as it was.
pub fn persist(manifest: Option<(&Path, &str)>, lock: &LockFile) -> Result<()> {
    let lock_contents = lock.to_string();
    let current = std::fs::read_to_string(lock.path()).ok();
    let staged_lock = if current.as_deref() != Some(lock_contents.as_str()) {
        Some(StagedFile::new(lock.path(), &lock_contents)?)
    } else {
        None
    };
    let staged_manifest = match manifest {
        Some((path, contents)) => Some(StagedFile::new(path, contents)?),
        None => None,
    };

    let lock_written = staged_lock.is_some();
    if let Some(file) = staged_lock {
        tracing::debug!("writing {}", file.target().display());
        file.commit()?;
    }

    let Some(file) = staged_manifest else {
        return Ok(());
    };
    tracing::debug!("writing {}", file.target().display());
    if let Err(e) = file.commit() {
        if lock_written {
            restore_lock(lock.path(), current.as_deref());
        }
        return Err(e);
    }
    Ok(())
}

fn restore_lock(path: &Path, previous: Option<&str>) {
    let restored = match previous {
        Some(contents) => StagedFile::new(path, contents).and_then(StagedFile::commit),
        None => std::fs::remove_file(path).map_err(Into::into),
    };
    if let Err(e) = restored {
        tracing::warn!("failed to restore {}: {:#}", path.display(), e);
    }
}
