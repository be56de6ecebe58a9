//! Configuration for kpm.
//!
//! Settings come from `<home>/config.toml`, then environment variables, then
//! command-line flags, each layer overriding the previous one. The result is
//! folded into a [`ResolveConfig`] that is passed explicitly to every
//! resolution; nothing here is process-global.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable selecting the storage scheme.
pub const STORAGE_ENV: &str = "KPM_STORAGE";

/// Environment variable selecting the version strategy.
pub const STRATEGY_ENV: &str = "KPM_STRATEGY";

/// Default OCI registry host for version-only dependencies.
pub const DEFAULT_REGISTRY_HOST: &str = "ghcr.io";

/// Default OCI namespace for version-only dependencies.
pub const DEFAULT_REGISTRY_NAMESPACE: &str = "kcl-lang";

/// How fetched packages are laid out under the home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageScheme {
    /// `<home>/<name>_<ref>`
    #[default]
    Legacy,
    /// `<home>/<kind>/src/<hash>/<name>/<ref>`
    ContentAddressed,
}

impl FromStr for StorageScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(StorageScheme::Legacy),
            "content-addressed" | "content_addressed" | "new" => Ok(StorageScheme::ContentAddressed),
            _ => Err(format!(
                "invalid storage scheme '{}'; expected 'legacy' or 'content-addressed'",
                s
            )),
        }
    }
}

/// How one version per package name is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionStrategy {
    /// The last requirement seen wins; root requirements win over transitive ones.
    #[default]
    Override,
    /// Minimal version selection: the maximum of all requested minimums.
    Mvs,
}

impl FromStr for VersionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "override" => Ok(VersionStrategy::Override),
            "mvs" => Ok(VersionStrategy::Mvs),
            _ => Err(format!(
                "invalid version strategy '{}'; expected 'override' or 'mvs'",
                s
            )),
        }
    }
}

/// Request-scoped resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResolveConfig {
    pub storage: StorageScheme,
    pub strategy: VersionStrategy,
}

impl ResolveConfig {
    pub fn new(storage: StorageScheme, strategy: VersionStrategy) -> Self {
        ResolveConfig { storage, strategy }
    }
}

/// kpm configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resolver settings
    pub resolver: ResolverConfig,

    /// Default registry settings
    pub registry: RegistryConfig,
}

/// `[resolver]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    pub storage: Option<StorageScheme>,
    pub strategy: Option<VersionStrategy>,
}

/// `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry host, e.g. `ghcr.io`
    pub host: String,
    /// Repository namespace, e.g. `kcl-lang`
    pub namespace: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            host: DEFAULT_REGISTRY_HOST.to_string(),
            namespace: DEFAULT_REGISTRY_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Apply `KPM_STORAGE` / `KPM_STRATEGY` overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(STORAGE_ENV).ok().as_deref(),
            std::env::var(STRATEGY_ENV).ok().as_deref(),
        );
    }

    fn apply_overrides(&mut self, storage: Option<&str>, strategy: Option<&str>) {
        if let Some(raw) = storage {
            match raw.parse() {
                Ok(s) => self.resolver.storage = Some(s),
                Err(e) => tracing::warn!("ignoring {}: {}", STORAGE_ENV, e),
            }
        }
        if let Some(raw) = strategy {
            match raw.parse() {
                Ok(s) => self.resolver.strategy = Some(s),
                Err(e) => tracing::warn!("ignoring {}: {}", STRATEGY_ENV, e),
            }
        }
    }

    /// The resolution settings this configuration describes.
    pub fn resolve_config(&self) -> ResolveConfig {
        ResolveConfig {
            storage: self.resolver.storage.unwrap_or_default(),
            strategy: self.resolver.strategy.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.resolve_config(), ResolveConfig::default());
        assert_eq!(config.registry.host, "ghcr.io");
        assert_eq!(config.registry.namespace, "kcl-lang");
    }

    #[test]
    fn test_load_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[resolver]
storage = "content-addressed"
strategy = "mvs"

[registry]
host = "registry.example.com"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.resolve_config(),
            ResolveConfig::new(StorageScheme::ContentAddressed, VersionStrategy::Mvs)
        );
        assert_eq!(config.registry.host, "registry.example.com");
        assert_eq!(config.registry.namespace, "kcl-lang");
    }

    #[test]
    fn test_broken_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[resolver\nstorage = ").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.resolve_config(), ResolveConfig::default());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some("content-addressed"), Some("bogus"));

        let resolved = config.resolve_config();
        assert_eq!(resolved.storage, StorageScheme::ContentAddressed);
        assert_eq!(resolved.strategy, VersionStrategy::Override);
    }
}
