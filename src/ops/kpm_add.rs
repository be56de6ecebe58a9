//! Implementation of `kpm add`.

use std::path::Path;

use anyhow::{Context, Result};
use toml_edit::{DocumentMut, Item, Table};

use crate::core::workspace::find_manifest;
use crate::core::{Dependency, Manifest, Package, SourceId};
use crate::ops::lockfile::persist;
use crate::ops::resolve::{resolve_with, ResolveResult};
use crate::util::{fs, GlobalContext};

/// Options for adding a dependency.
#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Where the new dependency comes from
    pub source: SourceId,

    /// Package to look for when the source holds several
    pub name: Option<String>,
}

impl AddOptions {
    pub fn new(source: SourceId) -> Self {
        AddOptions { source, name: None }
    }
}

/// Result of adding a dependency.
#[derive(Debug)]
pub struct AddResult {
    /// Name the dependency was declared under
    pub name: String,

    /// Version found in the dependency's manifest
    pub version: String,

    /// Resolution of the updated module
    pub resolution: ResolveResult,
}

/// Add a dependency to the module in `module_dir`.
///
/// The new source is fetched and its manifest read to learn the package name
/// and version. `kcl.mod` and `kcl.mod.lock` are only written once the
/// module, new dependency included, has resolved.
pub fn add_dependency(
    ctx: &GlobalContext,
    module_dir: &Path,
    opts: &AddOptions,
) -> Result<AddResult> {
    let module_dir = &fs::normalize_path(&ctx.cwd().join(module_dir));

    // Held from before the read so a concurrent edit cannot be lost.
    let cache = ctx.source_cache();
    cache.lock_home()?;

    let manifest_path = find_manifest(module_dir)?;
    let content = fs::read_to_string(&manifest_path)?;
    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;
    Manifest::parse(&content, &manifest_path)?;

    let hint = opts
        .name
        .clone()
        .or_else(|| opts.source.package().map(str::to_string))
        .unwrap_or_else(|| opts.source.display_name());
    let dep_root = cache.ensure_package(&hint, &opts.source)?;
    let dep_package = Package::load(&dep_root)?;
    let name = dep_package.name().to_string();
    let version = dep_package.version().to_string();

    ctx.shell().line(format!("adding dependency '{}'", name));

    let dependency = Dependency::new(&name, opts.source.clone()).with_version_req(&version);
    let registry = &ctx.config().registry;
    let deps = doc
        .entry("dependencies")
        .or_insert_with(|| Item::Table(Table::new()))
        .as_table_like_mut()
        .with_context(|| format!("`dependencies` in {} is not a table", manifest_path.display()))?;
    deps.insert(
        &name,
        Item::Value(dependency.to_manifest_value(module_dir, registry)),
    );

    let updated = doc.to_string();
    let manifest = Manifest::parse(&updated, &manifest_path)?;
    let root = Package::new(manifest, module_dir.to_path_buf());
    let resolution = resolve_with(ctx, &cache, root, SourceId::for_path(module_dir), false)?;

    persist(
        Some((manifest_path.as_path(), updated.as_str())),
        resolution.lock(),
    )?;
    ctx.shell()
        .line(format!("add dependency '{}:{}' successfully", name, version));

    Ok(AddResult {
        name,
        version,
        resolution,
    })
}
