//! Source identification - WHERE packages come from.
//!
//! A `SourceId` is a closed set of variants: a local directory, a git
//! repository at some reference, or an OCI artifact. Two descriptors that
//! name the same logical source produce the same [`SourceId::canonical_identity`],
//! whatever the host platform or the spelling used in the manifest.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::util::fs::normalize_path;

/// Prefix of OCI references in manifests.
pub const OCI_SCHEME: &str = "oci://";

/// A package source.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    /// A directory on the local filesystem. Never copied into the cache.
    Local { path: PathBuf },

    /// A git repository checked out at `reference`.
    ///
    /// `package` names a module nested somewhere inside the repository. It is
    /// not part of the cache identity: all packages of one repository at one
    /// reference share a checkout.
    Git {
        url: String,
        reference: GitReference,
        package: Option<String>,
    },

    /// An artifact in an OCI registry.
    Oci {
        registry: String,
        repository: String,
        tag: String,
    },
}

/// Git reference specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum GitReference {
    /// Default branch (usually main/master)
    #[default]
    DefaultBranch,
    /// Specific branch
    Branch(String),
    /// Specific tag
    Tag(String),
    /// Specific commit, full or abbreviated
    Commit(String),
}

impl GitReference {
    /// The query key used in source URLs and manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            GitReference::DefaultBranch => "default",
            GitReference::Branch(_) => "branch",
            GitReference::Tag(_) => "tag",
            GitReference::Commit(_) => "commit",
        }
    }

    /// The branch, tag or commit name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            GitReference::DefaultBranch => None,
            GitReference::Branch(s) | GitReference::Tag(s) | GitReference::Commit(s) => Some(s),
        }
    }

    fn from_query(key: &str, value: &str) -> Option<Self> {
        match key {
            "branch" => Some(GitReference::Branch(value.to_string())),
            "tag" => Some(GitReference::Tag(value.to_string())),
            "commit" | "rev" => Some(GitReference::Commit(value.to_string())),
            _ => None,
        }
    }
}

impl SourceId {
    /// Create a SourceId for a local path.
    pub fn for_path(path: &Path) -> Self {
        SourceId::Local {
            path: normalize_path(path),
        }
    }

    /// Create a SourceId for a git repository.
    pub fn for_git(url: impl Into<String>, reference: GitReference) -> Self {
        SourceId::Git {
            url: url.into(),
            reference,
            package: None,
        }
    }

    /// Create a SourceId for an OCI artifact.
    pub fn for_oci(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        SourceId::Oci {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Parse an `oci://<registry>/<repository>` reference.
    pub fn for_oci_url(reference: &str, tag: impl Into<String>) -> Result<Self> {
        let rest = reference.strip_prefix(OCI_SCHEME).unwrap_or(reference);
        let (registry, repository) = rest
            .split_once('/')
            .filter(|(r, p)| !r.is_empty() && !p.is_empty())
            .ok_or_else(|| anyhow::anyhow!("invalid OCI reference `{}`", reference))?;

        Ok(Self::for_oci(registry, repository.trim_end_matches('/'), tag))
    }

    /// Name a package nested inside a git repository.
    pub fn with_package(self, name: impl Into<String>) -> Self {
        match self {
            SourceId::Git { url, reference, .. } => SourceId::Git {
                url,
                reference,
                package: Some(name.into()),
            },
            other => other,
        }
    }

    /// Short tag for the variant: `local`, `git` or `oci`.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceId::Local { .. } => "local",
            SourceId::Git { .. } => "git",
            SourceId::Oci { .. } => "oci",
        }
    }

    /// Whether content has to be fetched into the cache.
    pub fn is_remote(&self) -> bool {
        !matches!(self, SourceId::Local { .. })
    }

    /// The git reference if this is a git source.
    pub fn git_reference(&self) -> Option<&GitReference> {
        match self {
            SourceId::Git { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// The nested package name of a git source.
    pub fn package(&self) -> Option<&str> {
        match self {
            SourceId::Git { package, .. } => package.as_deref(),
            _ => None,
        }
    }

    /// The local path of a local source.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            SourceId::Local { path } => Some(path),
            _ => None,
        }
    }

    /// The reference (branch, tag, commit) or OCI tag, if any.
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            SourceId::Local { .. } => None,
            SourceId::Git { reference, .. } => reference.name(),
            SourceId::Oci { tag, .. } => Some(tag),
        }
    }

    /// Human-readable name of the source: the repository name for git, the
    /// last repository segment for OCI, the directory name for local paths.
    pub fn display_name(&self) -> String {
        match self {
            SourceId::Local { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            SourceId::Git { url, .. } => {
                let url = url.replace('\\', "/");
                let trimmed = url.trim_end_matches('/');
                let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
                last.strip_suffix(".git").unwrap_or(last).to_string()
            }
            SourceId::Oci { repository, .. } => repository
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(repository)
                .to_string(),
        }
    }

    /// Canonical identity string used for cache addressing and deduplication.
    ///
    /// Separators are normalized to `/` and case-insensitive parts (scheme,
    /// host, registry, OCI repository) are lower-cased before anything hashes
    /// this string. Refs keep their case.
    pub fn canonical_identity(&self) -> String {
        match self {
            SourceId::Local { path } => {
                let raw = path.to_string_lossy().replace('\\', "/");
                format!("local:{}", raw.trim_end_matches('/'))
            }
            SourceId::Git { url, reference, .. } => {
                let url = canonical_git_url(url);
                if url.is_empty() {
                    return String::new();
                }
                match reference.name() {
                    Some(name) => format!("git:{}#{}={}", url, reference.kind(), name),
                    None => format!("git:{}", url),
                }
            }
            SourceId::Oci {
                registry,
                repository,
                tag,
            } => {
                let registry = registry.trim().trim_end_matches('/').to_lowercase();
                let repository = repository
                    .trim()
                    .replace('\\', "/")
                    .trim_matches('/')
                    .to_lowercase();
                if registry.is_empty() || repository.is_empty() {
                    return String::new();
                }
                format!("oci:{}/{}:{}", registry, repository, tag)
            }
        }
    }

    /// Convert to a lock file source string.
    ///
    /// Format: `kind+location?query`, e.g.
    /// - `path+/home/user/mylib`
    /// - `git+https://github.com/user/repo.git?branch=main&package=cc`
    /// - `oci+oci://ghcr.io/kcl-lang/k8s?tag=1.31.2`
    pub fn to_url_string(&self) -> String {
        match self {
            SourceId::Local { path } => format!("path+{}", path.to_string_lossy()),
            SourceId::Git {
                url,
                reference,
                package,
            } => {
                let mut query = Vec::new();
                if let Some(name) = reference.name() {
                    query.push(format!("{}={}", reference.kind(), name));
                }
                if let Some(package) = package {
                    query.push(format!("package={}", package));
                }
                if query.is_empty() {
                    format!("git+{}", url)
                } else {
                    format!("git+{}?{}", url, query.join("&"))
                }
            }
            SourceId::Oci {
                registry,
                repository,
                tag,
            } => format!("oci+{}{}/{}?tag={}", OCI_SCHEME, registry, repository, tag),
        }
    }

    /// Parse a lock file source string produced by [`SourceId::to_url_string`].
    pub fn parse(s: &str) -> Result<Self> {
        let (kind, rest) = s
            .split_once('+')
            .ok_or_else(|| anyhow::anyhow!("invalid source `{}`: missing kind prefix", s))?;

        match kind {
            "path" => Ok(SourceId::Local {
                path: PathBuf::from(rest),
            }),
            "git" => {
                let (url, query) = match rest.rsplit_once('?') {
                    Some((u, q)) => (u, Some(q)),
                    None => (rest, None),
                };
                let mut reference = GitReference::DefaultBranch;
                let mut package = None;
                for pair in query.into_iter().flat_map(|q| q.split('&')) {
                    let Some((key, value)) = pair.split_once('=') else {
                        continue;
                    };
                    if key == "package" {
                        package = Some(value.to_string());
                    } else if let Some(r) = GitReference::from_query(key, value) {
                        reference = r;
                    }
                }
                Ok(SourceId::Git {
                    url: url.to_string(),
                    reference,
                    package,
                })
            }
            "oci" => {
                let (location, query) = rest
                    .rsplit_once('?')
                    .ok_or_else(|| anyhow::anyhow!("invalid OCI source `{}`: missing tag", s))?;
                let tag = query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("tag="))
                    .ok_or_else(|| anyhow::anyhow!("invalid OCI source `{}`: missing tag", s))?;
                Self::for_oci_url(location, tag)
            }
            _ => bail!("unknown source kind: {}", kind),
        }
    }
}

/// Normalize a git URL for identity comparison.
fn canonical_git_url(raw: &str) -> String {
    let mut url = raw.trim().replace('\\', "/");
    while url.ends_with('/') {
        url.pop();
    }
    if let Some(stripped) = url.strip_suffix(".git") {
        url = stripped.to_string();
    }

    match Url::parse(&url) {
        Ok(parsed) => {
            // Scheme and host come back lower-cased from the parser.
            parsed.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => match url.split_once(':') {
            // scp-like `user@Host:org/repo`
            Some((host, path)) => format!("{}:{}", host.to_lowercase(), path),
            None => url,
        },
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({})", self.to_url_string())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Local { path } => write!(f, "{}", path.display()),
            SourceId::Git { url, reference, .. } => {
                write!(f, "{}", url)?;
                if let Some(name) = reference.name() {
                    write!(f, "?{}={}", reference.kind(), name)?;
                }
                Ok(())
            }
            SourceId::Oci {
                registry,
                repository,
                tag,
            } => write!(f, "{}{}/{}:{}", OCI_SCHEME, registry, repository, tag),
        }
    }
}

impl Serialize for SourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_url_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SourceId::parse(&s).map_err(serde::de::Error::custom)
    }
}
