//! Cache path derivation.
//!
//! Two layouts are supported under the home directory:
//!
//! ```text
//! legacy:            <home>/<name>_<ref>
//! content-addressed: <home>/<kind>/src/<hash>/<name>/<ref>
//! ```
//!
//! `<hash>` is a short SHA-256 of the source's canonical identity, so two
//! sources that share a display name but not an origin never collide, and
//! the same logical source maps to the same directory on every platform.
//! Local sources are never copied: their path is the local directory itself.

use std::path::{Path, PathBuf};

use crate::core::SourceId;
use crate::resolver::errors::ResolveError;
use crate::util::config::StorageScheme;
use crate::util::hash::short_hash;

/// Derive the on-disk location of `source` under `home`.
///
/// This is a pure function: it never touches the filesystem.
pub fn resolve_path(
    source: &SourceId,
    scheme: StorageScheme,
    home: &Path,
) -> Result<PathBuf, ResolveError> {
    if let SourceId::Local { path } = source {
        return Ok(path.clone());
    }

    let identity = source.canonical_identity();
    if identity.is_empty() {
        return Err(ResolveError::StorageAddressing {
            location: source.to_string(),
            reason: "empty canonical identity".to_string(),
        });
    }

    let name = source.display_name();
    if name.is_empty() {
        return Err(ResolveError::StorageAddressing {
            location: source.to_string(),
            reason: "cannot derive a package name from the source".to_string(),
        });
    }
    let reference = source.reference_name().map(path_component);

    let path = match scheme {
        StorageScheme::Legacy => match reference {
            Some(r) => home.join(format!("{}_{}", name, r)),
            None => home.join(name),
        },
        StorageScheme::ContentAddressed => {
            let base = home
                .join(source.kind())
                .join("src")
                .join(short_hash(&identity))
                .join(name);
            match reference {
                Some(r) => base.join(r),
                None => base,
            }
        }
    };

    Ok(path)
}

/// Refs such as `feature/x` must stay a single path component.
fn path_component(reference: &str) -> String {
    reference.replace(['/', '\\'], "-")
}
