//! Per-invocation context for kpm operations.
//!
//! A `GlobalContext` bundles the home (cache) directory, the output shell and
//! the resolution settings. It is built once per invocation and passed by
//! reference; two contexts with different homes or settings never share state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::BaseDirs;

use crate::core::workspace::{find_manifest as ws_find_manifest, ManifestError};
use crate::sources::{DefaultFetcher, Fetcher, SourceCache};
use crate::util::config::{Config, ResolveConfig};
use crate::util::shell::Shell;

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "KCL_PKG_PATH";

/// Context containing configuration and paths for one invocation.
#[derive(Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Root of the package cache (`~/.kcl/kpm` by default)
    home: PathBuf,

    /// Where contract lines and status messages go
    shell: Arc<Shell>,

    /// Loaded configuration file
    config: Config,

    /// Storage scheme and version strategy for resolutions run with this context
    resolve_config: ResolveConfig,

    /// Transport for remote sources; git and OCI over the network when unset
    fetcher: Option<Arc<dyn Fetcher>>,
}

impl fmt::Debug for GlobalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalContext")
            .field("cwd", &self.cwd)
            .field("home", &self.home)
            .field("config", &self.config)
            .field("resolve_config", &self.resolve_config)
            .finish_non_exhaustive()
    }
}

fn default_home() -> PathBuf {
    if let Some(path) = std::env::var_os(HOME_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".kcl").join("kpm"))
        .unwrap_or_else(|| PathBuf::from(".kpm"))
}

impl GlobalContext {
    /// Create a context from the environment: cwd, `KCL_PKG_PATH`, the
    /// home's `config.toml` and the `KPM_*` overrides.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd_and_home(cwd, default_home()))
    }

    /// Create a context rooted at explicit directories, ignoring `KCL_PKG_PATH`.
    pub fn with_cwd_and_home(cwd: PathBuf, home: PathBuf) -> Self {
        let mut config = Config::load_or_default(&home.join("config.toml"));
        config.apply_env();
        let resolve_config = config.resolve_config();

        GlobalContext {
            cwd,
            home,
            shell: Arc::new(Shell::default()),
            config,
            resolve_config,
            fetcher: None,
        }
    }

    /// Replace the home directory for this context only.
    pub fn with_home(self, home: PathBuf) -> Self {
        let mut ctx = Self::with_cwd_and_home(self.cwd, home);
        ctx.shell = self.shell;
        ctx.fetcher = self.fetcher;
        ctx
    }

    /// Replace the output shell.
    pub fn with_shell(mut self, shell: impl Into<Arc<Shell>>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Replace the resolution settings.
    pub fn with_resolve_config(mut self, resolve_config: ResolveConfig) -> Self {
        self.resolve_config = resolve_config;
        self
    }

    /// Replace the transport used for remote sources.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the package cache root.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the output shell.
    pub fn shell(&self) -> &Arc<Shell> {
        &self.shell
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the resolution settings.
    pub fn resolve_config(&self) -> ResolveConfig {
        self.resolve_config
    }

    /// Get the transport for remote sources.
    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        match self.fetcher {
            Some(ref fetcher) => Arc::clone(fetcher),
            None => Arc::new(DefaultFetcher::new(Arc::clone(&self.shell))),
        }
    }

    /// A fresh source cache over this context's home, for one operation.
    pub fn source_cache(&self) -> SourceCache {
        SourceCache::new(
            self.home.clone(),
            self.resolve_config.storage,
            self.fetcher(),
        )
    }

    /// Find `kcl.mod` starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        let mut current = self.cwd.clone();
        loop {
            match ws_find_manifest(&current) {
                Ok(path) => return Ok(path),
                Err(ManifestError::NotFound { .. }) => {
                    if !current.pop() {
                        return Err(ManifestError::NotFound {
                            dir: self.cwd.clone(),
                        });
                    }
                }
            }
        }
    }
}
