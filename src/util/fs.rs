//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::{NamedTempFile, TempDir};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Lexically normalize a path: drop `.` components and fold `..` where possible.
///
/// Unlike `canonicalize`, this never touches the filesystem, so it works for
/// paths that do not exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// A file write that has been staged next to its target but not yet
/// made visible.
///
/// Dropping a `StagedFile` without calling [`StagedFile::commit`] discards it
/// and leaves the target untouched.
pub struct StagedFile {
    target: PathBuf,
    temp: NamedTempFile,
}

impl StagedFile {
    /// Write `contents` to a temporary file in the target's directory.
    pub fn new(target: &Path, contents: &str) -> Result<Self> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        ensure_dir(dir)?;

        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to stage write in {}", dir.display()))?;
        temp.write_all(contents.as_bytes())
            .with_context(|| format!("failed to stage write for {}", target.display()))?;
        temp.as_file().sync_all()?;

        Ok(StagedFile {
            target: target.to_path_buf(),
            temp,
        })
    }

    /// The file this write will replace.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replace the target with the staged contents.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to write file: {}", target.display()))?;
        Ok(())
    }
}

/// Create a staging directory next to `dest` for an in-progress download.
///
/// The directory is removed automatically if it is dropped before
/// [`install_dir`] moves it into place.
pub fn staging_dir_for(dest: &Path) -> Result<TempDir> {
    let parent = dest
        .parent()
        .with_context(|| format!("cache path has no parent: {}", dest.display()))?;
    ensure_dir(parent)?;

    let prefix = format!(
        ".{}.partial-",
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(parent)
        .with_context(|| format!("failed to create staging directory in {}", parent.display()))
}

/// Move a fully populated staging directory to `dest`.
///
/// An existing `dest` is replaced: it is first renamed aside, so readers
/// never see a half-replaced tree.
pub fn install_dir(staging: TempDir, dest: &Path) -> Result<()> {
    let staged = staging.into_path();

    if dest.exists() {
        let parent = dest.parent().unwrap_or(Path::new("."));
        let trash = tempfile::Builder::new()
            .prefix(".stale-")
            .tempdir_in(parent)
            .with_context(|| format!("failed to prepare replacement of {}", dest.display()))?;
        let aside = trash.path().join("old");
        fs::rename(dest, &aside)
            .with_context(|| format!("failed to move aside {}", dest.display()))?;
        if let Err(e) = fs::rename(&staged, dest) {
            let _ = fs::rename(&aside, dest);
            let _ = fs::remove_dir_all(&staged);
            return Err(e).with_context(|| format!("failed to install {}", dest.display()));
        }
        drop(trash);
        return Ok(());
    }

    if let Err(e) = fs::rename(&staged, dest) {
        let _ = fs::remove_dir_all(&staged);
        return Err(e).with_context(|| format!("failed to install {}", dest.display()));
    }

    Ok(())
}

/// Recursively copy a directory.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory: {}", dst.display()))?;

    for entry in
        fs::read_dir(src).with_context(|| format!("failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        }
    }
    Ok(())
}
