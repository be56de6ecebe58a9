//! Module layout on disk: manifest and lock file names, lookup helpers.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::core::manifest::Manifest;

/// Manifest file name.
pub const MANIFEST_NAME: &str = "kcl.mod";

/// Lock file name.
pub const LOCKFILE_NAME: &str = "kcl.mod.lock";

/// Error locating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `{MANIFEST_NAME}` in `{}`", dir.display())]
    NotFound { dir: PathBuf },
}

/// Find `kcl.mod` in the given directory.
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    let path = dir.join(MANIFEST_NAME);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ManifestError::NotFound {
            dir: dir.to_path_buf(),
        })
    }
}

/// The lock file path for a module root, whether or not it exists.
pub fn lockfile_path(dir: &Path) -> PathBuf {
    dir.join(LOCKFILE_NAME)
}

/// Locate the module named `name` under `root`.
///
/// The root module itself wins if it carries that name; otherwise the tree is
/// walked in sorted order and the first manifest declaring `name` is returned.
/// Manifests that fail to parse are skipped.
pub fn locate_package(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == MANIFEST_NAME)
        .find(|e| {
            Manifest::load(e.path())
                .map(|m| m.name == name)
                .unwrap_or(false)
        })
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}
