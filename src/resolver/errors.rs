//! Resolution error types and diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error during dependency resolution.
///
/// Operations return `anyhow::Result`; callers that need to branch on the
/// kind recover it with `err.downcast_ref::<ResolveError>()`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to parse manifest `{}`: {reason}", path.display())]
    ManifestParse { path: PathBuf, reason: String },

    #[error("cyclic dependency detected: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("failed to fetch `{location}`: {reason}")]
    SourceFetch { location: String, reason: String },

    #[error("package '{name}:{version}' not found")]
    VersionNotFound { name: String, version: String },

    #[error("cannot address `{location}` in the package cache: {reason}")]
    StorageAddressing { location: String, reason: String },

    #[error("lock conflict for `{name}`: locked to `{locked}`, resolved to `{resolved}`")]
    LockConflict {
        name: String,
        locked: String,
        resolved: String,
    },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },
}

impl ResolveError {
    pub fn manifest_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ResolveError::ManifestParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn source_fetch(location: impl ToString, reason: impl ToString) -> Self {
        ResolveError::SourceFetch {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn version_not_found(name: impl Into<String>, version: impl Into<String>) -> Self {
        ResolveError::VersionNotFound {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ResolveError::Configuration {
            message: message.into(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::ManifestParse { path, reason } => {
                Diagnostic::error(format!("invalid manifest: {}", reason))
                    .with_location(path.clone())
                    .with_suggestion(
                        "help: Every `kcl.mod` needs `name` and `version` in its [package] section"
                            .to_string(),
                    )
            }

            ResolveError::CyclicDependency { cycle } => {
                Diagnostic::error("cycle detected in dependency graph")
                    .with_context(format!("cycle: {}", cycle.join(" -> ")))
                    .with_suggestion(
                        "help: Break the cycle by removing or restructuring dependencies".to_string(),
                    )
            }

            ResolveError::SourceFetch { location, reason } => {
                Diagnostic::error(format!("error fetching from `{}`", location))
                    .with_context(reason.clone())
                    .with_suggestion(suggestions::FETCH_FAILED.to_string())
            }

            ResolveError::VersionNotFound { name, version } => {
                Diagnostic::error(self.to_string())
                    .with_context(format!(
                        "the source of `{}` does not provide version {}",
                        name, version
                    ))
                    .with_suggestion(suggestions::VERSION_NOT_FOUND.to_string())
            }

            ResolveError::StorageAddressing { location, reason } => {
                Diagnostic::error(format!("cannot derive a cache path for `{}`", location))
                    .with_context(reason.clone())
            }

            ResolveError::LockConflict {
                name,
                locked,
                resolved,
            } => Diagnostic::error(format!("`kcl.mod.lock` is out of date for `{}`", name))
                .with_context(format!("locked:   {}", locked))
                .with_context(format!("resolved: {}", resolved))
                .with_suggestion(suggestions::LOCK_CONFLICT.to_string()),

            ResolveError::Configuration { message } => Diagnostic::error(message.clone()),
        }
    }
}
