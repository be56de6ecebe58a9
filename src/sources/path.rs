//! Path source - local filesystem dependencies.
//!
//! Local modules are used in place. "Fetching" one only checks that the
//! directory is there and carries a manifest.

use std::path::{Path, PathBuf};

use crate::core::workspace::find_manifest;
use crate::resolver::errors::ResolveError;

/// Validate a local module directory and return it.
pub fn ensure_local(path: &Path) -> Result<PathBuf, ResolveError> {
    if !path.is_dir() {
        return Err(ResolveError::source_fetch(
            path.display(),
            "directory does not exist",
        ));
    }

    find_manifest(path).map_err(|e| ResolveError::source_fetch(path.display(), e))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_local() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing");
        assert!(matches!(
            ensure_local(&missing),
            Err(ResolveError::SourceFetch { .. })
        ));

        let err = ensure_local(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("could not find `kcl.mod`"));

        std::fs::write(
            tmp.path().join("kcl.mod"),
            "[package]\nname = \"lib\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        assert_eq!(ensure_local(tmp.path()).unwrap(), tmp.path());
    }
}
