//! `kcl.mod` manifest parsing and schema.
//!
//! A manifest carries a `[package]` section (name, version, edition) and an
//! ordered `[dependencies]` table. Declaration order is kept: it drives graph
//! traversal and therefore the Override version strategy.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::dependency::{Dependency, DependencySpec};
use crate::resolver::errors::ResolveError;
use crate::util::config::RegistryConfig;

/// The parsed `kcl.mod` manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Package name
    pub name: String,

    /// Package version
    pub version: String,

    /// Language edition
    pub edition: Option<String>,

    /// Declared dependencies, in file order
    pub dependencies: Vec<(String, DependencySpec)>,

    /// The directory containing this manifest
    pub manifest_dir: PathBuf,
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    package: Option<RawPackage>,

    #[serde(default)]
    dependencies: Option<toml::Table>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPackage {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    edition: Option<String>,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Ok(Self::parse(&content, path)?)
    }

    /// Parse manifest content.
    ///
    /// A missing or empty `name` or `version` is a [`ResolveError::ManifestParse`].
    pub fn parse(content: &str, path: &Path) -> Result<Self, ResolveError> {
        let raw: RawManifest = toml::from_str(content)
            .map_err(|e| ResolveError::manifest_parse(path, e.message().to_string()))?;

        let package = raw.package.unwrap_or_default();
        let name = package
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ResolveError::manifest_parse(path, "missing package name"))?;
        let version = package
            .version
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ResolveError::manifest_parse(path, format!("missing version of package `{}`", name))
            })?;

        let mut dependencies = Vec::new();
        for (dep_name, value) in raw.dependencies.unwrap_or_default() {
            let spec: DependencySpec = value.try_into().map_err(|e: toml::de::Error| {
                ResolveError::manifest_parse(
                    path,
                    format!("invalid dependency `{}`: {}", dep_name, e.message()),
                )
            })?;
            dependencies.push((dep_name, spec));
        }

        Ok(Manifest {
            name,
            version,
            edition: package.edition,
            dependencies,
            manifest_dir: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        })
    }

    /// Resolve the declared dependencies into source-qualified dependencies.
    pub fn dependencies(&self, registry: &RegistryConfig) -> Result<Vec<Dependency>> {
        self.dependencies
            .iter()
            .map(|(name, spec)| spec.to_dependency(name, &self.manifest_dir, registry))
            .collect()
    }
}
