//! Package - a manifest together with the directory it was loaded from.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::workspace::MANIFEST_NAME;
use crate::core::Manifest;

/// A module on disk.
#[derive(Debug, Clone)]
pub struct Package {
    /// The parsed manifest
    manifest: Manifest,

    /// Root directory of the package
    root: PathBuf,
}

impl Package {
    /// Create a new package from a manifest and root directory.
    pub fn new(manifest: Manifest, root: PathBuf) -> Self {
        Package { manifest, root }
    }

    /// Load the package rooted at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let manifest = Manifest::load(&root.join(MANIFEST_NAME))?;
        Ok(Package::new(manifest, root.to_path_buf()))
    }

    /// Get the package name.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Get the package version.
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Get the manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Get the package root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the manifest file path.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_package() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_NAME),
            "[package]\nname = \"helloworld\"\nversion = \"0.1.2\"\n",
        )
        .unwrap();

        let pkg = Package::load(tmp.path()).unwrap();
        assert_eq!(pkg.name(), "helloworld");
        assert_eq!(pkg.version(), "0.1.2");
        assert_eq!(pkg.root(), tmp.path());
        assert_eq!(pkg.manifest_path(), tmp.path().join("kcl.mod"));
    }

    #[test]
    fn test_load_missing_package() {
        let tmp = TempDir::new().unwrap();
        assert!(Package::load(tmp.path()).is_err());
    }
}
