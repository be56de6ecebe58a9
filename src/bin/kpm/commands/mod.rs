//! Command implementations

pub mod add;
pub mod metadata;
pub mod resolve;
pub mod update;

use std::path::PathBuf;

use anyhow::Result;
use kpm::util::GlobalContext;

/// Directory of the module containing the current directory.
pub fn module_dir(ctx: &GlobalContext) -> Result<PathBuf> {
    let manifest = ctx.find_manifest()?;
    Ok(manifest
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ctx.cwd().to_path_buf()))
}
