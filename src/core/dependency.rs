//! Dependency specification.
//!
//! A Dependency describes what a module requires from another package: a
//! name, an optional requested version, and the source to fetch it from.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use toml_edit::{InlineTable, Value};

use crate::core::source_id::{GitReference, SourceId, OCI_SCHEME};
use crate::resolver::errors::ResolveError;
use crate::util::config::RegistryConfig;
use crate::util::fs::relative_path;

/// A dependency edge declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Package name
    name: String,

    /// Requested version, if the manifest pins one
    version_req: Option<String>,

    /// Where to find the package
    source_id: SourceId,
}

impl Dependency {
    /// Create a new dependency with no version requirement.
    pub fn new(name: impl Into<String>, source_id: SourceId) -> Self {
        Dependency {
            name: name.into(),
            version_req: None,
            source_id,
        }
    }

    /// Create a dependency with a requested version.
    pub fn with_version_req(mut self, version: impl Into<String>) -> Self {
        self.version_req = Some(version.into());
        self
    }

    /// Get the package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the requested version.
    pub fn version_req(&self) -> Option<&str> {
        self.version_req.as_deref()
    }

    /// Get the source ID.
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Render this dependency as a `kcl.mod` value.
    ///
    /// Packages from the default registry collapse to a bare version string;
    /// everything else becomes an inline table. Local paths are written
    /// relative to `manifest_dir`.
    pub fn to_manifest_value(&self, manifest_dir: &Path, registry: &RegistryConfig) -> Value {
        let mut table = InlineTable::new();

        match &self.source_id {
            SourceId::Local { path } => {
                let rel = relative_path(manifest_dir, path);
                table.insert("path", rel.to_string_lossy().replace('\\', "/").into());
            }
            SourceId::Git {
                url,
                reference,
                package,
            } => {
                table.insert("git", url.as_str().into());
                if let Some(name) = reference.name() {
                    table.insert(reference.kind(), name.into());
                }
                if let Some(package) = package {
                    table.insert("package", package.as_str().into());
                }
                if let Some(version) = &self.version_req {
                    table.insert("version", version.as_str().into());
                }
            }
            SourceId::Oci {
                registry: host,
                repository,
                tag,
            } => {
                let default_repo = format!("{}/{}", registry.namespace, self.name);
                if host == &registry.host && repository == &default_repo {
                    return Value::from(tag.as_str());
                }
                table.insert(
                    "oci",
                    format!("{}{}/{}", OCI_SCHEME, host, repository).into(),
                );
                table.insert("tag", tag.as_str().into());
            }
        }

        Value::InlineTable(table)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version_req {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

/// Dependency specification as it appears in `kcl.mod`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Registry version string: `k8s = "1.31.2"`
    Simple(String),

    /// Detailed specification
    Detailed(DetailedDependencySpec),
}

/// Detailed dependency specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedDependencySpec {
    /// Requested version
    #[serde(default)]
    pub version: Option<String>,

    /// Path to a local module
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Git repository URL
    #[serde(default)]
    pub git: Option<String>,

    /// Git branch
    #[serde(default)]
    pub branch: Option<String>,

    /// Git tag, or OCI tag when `oci` is set
    #[serde(default)]
    pub tag: Option<String>,

    /// Git commit
    #[serde(default)]
    pub commit: Option<String>,

    /// Module nested inside the git repository
    #[serde(default)]
    pub package: Option<String>,

    /// OCI reference: `oci://<registry>/<repository>`
    #[serde(default)]
    pub oci: Option<String>,
}

impl DependencySpec {
    /// Convert to a Dependency given the package name and manifest directory.
    pub fn to_dependency(
        &self,
        name: &str,
        manifest_dir: &Path,
        registry: &RegistryConfig,
    ) -> anyhow::Result<Dependency> {
        match self {
            DependencySpec::Simple(version) => {
                let source_id = SourceId::for_oci(
                    registry.host.as_str(),
                    format!("{}/{}", registry.namespace, name),
                    version.as_str(),
                );
                Ok(Dependency::new(name, source_id).with_version_req(version.as_str()))
            }
            DependencySpec::Detailed(spec) => spec.to_dependency(name, manifest_dir, registry),
        }
    }
}

impl DetailedDependencySpec {
    /// Convert to a Dependency.
    pub fn to_dependency(
        &self,
        name: &str,
        manifest_dir: &Path,
        registry: &RegistryConfig,
    ) -> anyhow::Result<Dependency> {
        let source_id = if let Some(ref path) = self.path {
            let full_path = if path.is_absolute() {
                path.clone()
            } else {
                manifest_dir.join(path)
            };
            SourceId::for_path(&full_path)
        } else if let Some(ref git_url) = self.git {
            let reference = if let Some(ref branch) = self.branch {
                GitReference::Branch(branch.clone())
            } else if let Some(ref tag) = self.tag {
                GitReference::Tag(tag.clone())
            } else if let Some(ref commit) = self.commit {
                GitReference::Commit(commit.clone())
            } else {
                GitReference::DefaultBranch
            };
            let source_id = SourceId::for_git(git_url.as_str(), reference);
            match self.package {
                Some(ref package) => source_id.with_package(package.as_str()),
                None => source_id,
            }
        } else if let Some(ref oci) = self.oci {
            let tag = self
                .tag
                .as_deref()
                .or(self.version.as_deref())
                .ok_or_else(|| {
                    ResolveError::configuration(format!(
                        "dependency `{}` uses `oci` without a `tag`",
                        name
                    ))
                })?;
            SourceId::for_oci_url(oci, tag)
                .map_err(|e| ResolveError::configuration(format!("dependency `{}`: {}", name, e)))?
        } else if let Some(ref version) = self.version {
            return DependencySpec::Simple(version.clone()).to_dependency(
                name,
                manifest_dir,
                registry,
            );
        } else {
            return Err(ResolveError::configuration(format!(
                "dependency `{}` must specify `path`, `git`, `oci`, or `version`",
                name
            ))
            .into());
        };

        let mut dep = Dependency::new(name, source_id);
        if let Some(ref version) = self.version {
            dep = dep.with_version_req(version.as_str());
        }
        Ok(dep)
    }
}
