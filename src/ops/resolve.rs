//! Module resolution operations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::workspace::{find_manifest, lockfile_path};
use crate::core::{Package, SourceId};
use crate::ops::lockfile::{persist, reconcile};
use crate::resolver::encode::LockFile;
use crate::resolver::errors::ResolveError;
use crate::resolver::{GraphBuilder, Resolve};
use crate::sources::SourceCache;
use crate::util::{fs, GlobalContext};

/// Options for resolving a module.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Write `kcl.mod.lock` after a successful resolution
    pub update_lock: bool,

    /// Fail instead of changing the source of a locked package
    pub locked: bool,
}

/// The outcome of resolving a module.
#[derive(Debug)]
pub struct ResolveResult {
    resolve: Resolve,
    lock: LockFile,
}

impl ResolveResult {
    /// The selected packages.
    pub fn resolve(&self) -> &Resolve {
        &self.resolve
    }

    /// The reconciled lock file (not necessarily written).
    pub fn lock(&self) -> &LockFile {
        &self.lock
    }

    /// Flat name -> package root map.
    pub fn dependency_map(&self) -> BTreeMap<String, PathBuf> {
        self.resolve.dependency_map()
    }

    /// JSON summary handed to the language toolchain.
    pub fn summary_json(&self) -> Result<String> {
        self.resolve.summary_json()
    }
}

/// Resolve the module in `module_dir`.
pub fn resolve_module(
    ctx: &GlobalContext,
    module_dir: &Path,
    opts: ResolveOptions,
) -> Result<ResolveResult> {
    let module_dir = &fs::normalize_path(&ctx.cwd().join(module_dir));

    // Without `update_lock` the cache locks lazily, on the first fetch.
    let cache = ctx.source_cache();
    if opts.update_lock {
        cache.lock_home()?;
    }

    let root = load_root(module_dir)?;
    let result = resolve_with(ctx, &cache, root, SourceId::for_path(module_dir), opts.locked)?;

    if opts.update_lock {
        persist(None, result.lock())?;
    }
    Ok(result)
}

/// Resolve the dependencies of the module at `source`.
///
/// A remote root is fetched into the cache first; its lock file is never
/// written.
pub fn run(ctx: &GlobalContext, source: &SourceId) -> Result<ResolveResult> {
    let cache = ctx.source_cache();

    let (root_dir, root_source) = match source {
        SourceId::Local { path } => (path.clone(), source.clone()),
        _ => {
            let name = source
                .package()
                .map(str::to_string)
                .unwrap_or_else(|| source.display_name());
            (cache.ensure_package(&name, source)?, source.clone())
        }
    };

    let root = load_root(&root_dir)?;
    resolve_with(ctx, &cache, root, root_source, false)
}

/// Build, select and reconcile against the root's lock file.
pub(crate) fn resolve_with(
    ctx: &GlobalContext,
    cache: &SourceCache,
    root: Package,
    root_source: SourceId,
    locked: bool,
) -> Result<ResolveResult> {
    tracing::info!("resolving dependencies of {}", root.name());
    let lock_path = lockfile_path(root.root());

    let graph = GraphBuilder::new(cache, &ctx.config().registry).build(root, root_source)?;
    let resolve = Resolve::from_graph(&graph, ctx.resolve_config().strategy)?;
    tracing::info!("resolved {} packages", resolve.len());

    let lock = reconcile(LockFile::load_or_new(&lock_path)?, &resolve, locked)?;
    Ok(ResolveResult { resolve, lock })
}

/// Load the module rooted at `dir`.
pub(crate) fn load_root(dir: &Path) -> Result<Package> {
    find_manifest(dir)?;
    Package::load(dir).map_err(|e| {
        if e.downcast_ref::<ResolveError>().is_some() {
            e
        } else {
            ResolveError::manifest_parse(
                dir.join(crate::core::MANIFEST_NAME),
                format!("{:#}", e),
            )
            .into()
        }
    })
}
