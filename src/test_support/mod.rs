//! Test utilities for kpm unit tests.
//!
//! [`FixtureFetcher`] stands in for the network: git sources are cloned from
//! local repositories built with [`GitFixture`], and OCI artifacts are copied
//! from directories registered with [`FixtureFetcher::with_artifact`].

pub mod fixtures;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};

use crate::core::SourceId;
use crate::sources::{Fetcher, GitFetcher};
use crate::util::fs::copy_dir_all;
use crate::util::Shell;

pub use fixtures::*;

/// A fetcher that never leaves the local machine.
pub struct FixtureFetcher {
    shell: Arc<Shell>,
    git: GitFetcher,
    artifacts: HashMap<String, PathBuf>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FixtureFetcher {
    pub fn new(shell: Arc<Shell>) -> Self {
        FixtureFetcher {
            git: GitFetcher::new(Arc::clone(&shell)),
            shell,
            artifacts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Serve `source` (an OCI source) from the module directory `dir`.
    pub fn with_artifact(mut self, source: &SourceId, dir: &Path) -> Self {
        self.artifacts
            .insert(source.canonical_identity(), dir.to_path_buf());
        self
    }

    /// Sleep before every fetch, widening race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of physical fetches of `source` so far.
    pub fn fetch_count(&self, source: &SourceId) -> usize {
        let identity = source.canonical_identity();
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == identity)
            .count()
    }
}

impl Fetcher for FixtureFetcher {
    fn fetch(&self, source: &SourceId, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(source.canonical_identity());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        match source {
            SourceId::Oci {
                registry,
                repository,
                tag,
            } => {
                self.shell.line(format!(
                    "downloading '{}:{}' from '{}/{}:{}'",
                    repository, tag, registry, repository, tag
                ));
                match self.artifacts.get(&source.canonical_identity()) {
                    Some(dir) => copy_dir_all(dir, dest),
                    None => bail!("artifact {}/{}:{} not found", registry, repository, tag),
                }
            }
            _ => self.git.fetch(source, dest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::shell::captured;
    use tempfile::TempDir;

    #[test]
    fn test_fixture_fetcher_serves_artifacts() {
        let tmp = TempDir::new().unwrap();
        let artifact = tmp.path().join("artifact");
        write_module(&artifact, "k8s", "1.28", &[]);
        let oci = SourceId::for_oci("ghcr.io", "kcl-lang/k8s", "1.28");

        let (shell, buffer) = Shell::capture();
        let fetcher = FixtureFetcher::new(Arc::new(shell)).with_artifact(&oci, &artifact);
        let dest = tmp.path().join("dest");
        std::fs::create_dir_all(&dest).unwrap();
        fetcher.fetch(&oci, &dest).unwrap();

        assert!(dest.join("kcl.mod").is_file());
        assert_eq!(fetcher.fetch_count(&oci), 1);
        assert_eq!(
            captured(&buffer),
            "downloading 'kcl-lang/k8s:1.28' from 'ghcr.io/kcl-lang/k8s:1.28'\n"
        );

        let missing = SourceId::for_oci("ghcr.io", "kcl-lang/k8s", "9.9");
        assert!(fetcher.fetch(&missing, &dest).is_err());
    }
}
