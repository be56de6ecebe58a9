//! Source cache management.
//!
//! A `SourceCache` lives for one operation. It maps every source to its cache
//! path, fetches what is missing, and guarantees that a given source identity
//! is fetched at most once however many threads ask for it concurrently.
//!
//! Writes into the home directory happen under its [`HomeLock`]. The cache
//! takes the lock before its first physical fetch and keeps it until it is
//! dropped; operations that also rewrite module files take it up front with
//! [`SourceCache::lock_home`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{anyhow, Result};

use crate::core::workspace::{find_manifest, locate_package};
use crate::core::SourceId;
use crate::resolver::errors::ResolveError;
use crate::sources::path::ensure_local;
use crate::sources::{storage, Fetcher};
use crate::util::config::StorageScheme;
use crate::util::fs::{install_dir, staging_dir_for};
use crate::util::HomeLock;

type FetchCell = Arc<OnceLock<Result<PathBuf, String>>>;

/// Materializes sources into the package cache.
pub struct SourceCache {
    /// Root of the package cache
    home: PathBuf,

    /// Cache layout
    storage: StorageScheme,

    /// Transport for remote sources
    fetcher: Arc<dyn Fetcher>,

    /// Re-download remote sources even if already cached
    refresh: bool,

    /// One cell per canonical identity; the first caller fills it, the others wait.
    in_flight: Mutex<HashMap<String, FetchCell>>,

    /// Held from the first write into `home` until the cache is dropped
    home_lock: Mutex<Option<HomeLock>>,
}

impl SourceCache {
    /// Create a new source cache.
    pub fn new(home: PathBuf, storage: StorageScheme, fetcher: Arc<dyn Fetcher>) -> Self {
        SourceCache {
            home,
            storage,
            fetcher,
            refresh: false,
            in_flight: Mutex::new(HashMap::new()),
            home_lock: Mutex::new(None),
        }
    }

    /// Re-download every remote source once during this operation.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Get the cache root.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the cache layout.
    pub fn storage(&self) -> StorageScheme {
        self.storage
    }

    /// Take the home directory lock for the rest of this cache's life.
    ///
    /// Blocks while another process holds it. Calling it again is a no-op.
    pub fn lock_home(&self) -> Result<()> {
        let mut guard = self
            .home_lock
            .lock()
            .map_err(|_| anyhow!("home lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(HomeLock::acquire(&self.home)?);
        }
        Ok(())
    }

    /// Where `source` lives (or will live) on disk.
    pub fn cache_path(&self, source: &SourceId) -> Result<PathBuf, ResolveError> {
        storage::resolve_path(source, self.storage, &self.home)
    }

    /// Make sure `source` is on disk and return its root directory.
    pub fn ensure_fetched(&self, source: &SourceId) -> Result<PathBuf> {
        let dest = self.cache_path(source)?;
        if let SourceId::Local { path } = source {
            return Ok(ensure_local(path)?);
        }

        let cell = {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| anyhow!("source cache lock poisoned"))?;
            Arc::clone(in_flight.entry(source.canonical_identity()).or_default())
        };

        let result = cell.get_or_init(|| {
            self.materialize(source, &dest)
                .map_err(|e| format!("{:#}", e))
        });

        match result {
            Ok(path) => Ok(path.clone()),
            Err(reason) => Err(ResolveError::source_fetch(source, reason).into()),
        }
    }

    /// Fetch `source` and return the root of the package named `name` in it.
    ///
    /// A git repository may hold the package anywhere in its tree: an explicit
    /// `package` wins, then a manifest at the repository root, then any nested
    /// manifest declaring `name`.
    pub fn ensure_package(&self, name: &str, source: &SourceId) -> Result<PathBuf> {
        let root = self.ensure_fetched(source)?;
        if !matches!(source, SourceId::Git { .. }) {
            return Ok(root);
        }

        if let Some(package) = source.package() {
            return locate_package(&root, package).ok_or_else(|| {
                ResolveError::source_fetch(
                    source,
                    format!("no package named `{}` in the repository", package),
                )
                .into()
            });
        }

        if find_manifest(&root).is_ok() {
            return Ok(root);
        }

        locate_package(&root, name).ok_or_else(|| {
            ResolveError::source_fetch(
                source,
                format!("no `kcl.mod` for package `{}` in the repository", name),
            )
            .into()
        })
    }

    fn materialize(&self, source: &SourceId, dest: &Path) -> Result<PathBuf> {
        if dest.is_dir() && !self.refresh {
            tracing::debug!("{} already cached at {}", source, dest.display());
            return Ok(dest.to_path_buf());
        }

        self.lock_home()?;
        // Another process may have installed it while we waited.
        if dest.is_dir() && !self.refresh {
            tracing::debug!("{} cached by another process", source);
            return Ok(dest.to_path_buf());
        }

        let staging = staging_dir_for(dest)?;
        self.fetcher.fetch(source, staging.path())?;
        install_dir(staging, dest)?;

        tracing::debug!("fetched {} into {}", source, dest.display());
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GitReference;
    use crate::test_support::{write_module, FixtureFetcher};
    use crate::util::shell::captured;
    use crate::util::Shell;
    use rayon::prelude::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn oci(tag: &str) -> SourceId {
        SourceId::for_oci("ghcr.io", "kcl-lang/helloworld", tag)
    }

    #[test]
    fn test_concurrent_requests_fetch_once() {
        let tmp = TempDir::new().unwrap();
        let artifact = tmp.path().join("artifact");
        write_module(&artifact, "helloworld", "0.1.2", &[]);

        let (shell, buffer) = Shell::capture();
        let fetcher = Arc::new(
            FixtureFetcher::new(Arc::new(shell))
                .with_artifact(&oci("0.1.2"), &artifact)
                .with_delay(Duration::from_millis(50)),
        );
        let cache = SourceCache::new(
            tmp.path().join("home"),
            StorageScheme::ContentAddressed,
            fetcher.clone(),
        );

        let paths: Vec<PathBuf> = (0..8)
            .into_par_iter()
            .map(|_| cache.ensure_fetched(&oci("0.1.2")).unwrap())
            .collect();

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert!(paths[0].join("kcl.mod").is_file());
        assert_eq!(fetcher.fetch_count(&oci("0.1.2")), 1);
        assert_eq!(
            captured(&buffer),
            "downloading 'kcl-lang/helloworld:0.1.2' from 'ghcr.io/kcl-lang/helloworld:0.1.2'\n"
        );
    }

    #[test]
    fn test_cached_source_is_not_fetched_again() {
        let tmp = TempDir::new().unwrap();
        let artifact = tmp.path().join("artifact");
        write_module(&artifact, "helloworld", "0.1.2", &[]);
        let home = tmp.path().join("home");

        let (shell, _) = Shell::capture();
        let fetcher = Arc::new(
            FixtureFetcher::new(Arc::new(shell)).with_artifact(&oci("0.1.2"), &artifact),
        );

        let first = SourceCache::new(home.clone(), StorageScheme::Legacy, fetcher.clone());
        first.ensure_fetched(&oci("0.1.2")).unwrap();
        let second = SourceCache::new(home.clone(), StorageScheme::Legacy, fetcher.clone());
        let path = second.ensure_fetched(&oci("0.1.2")).unwrap();
        assert_eq!(path, home.join("helloworld_0.1.2"));
        assert_eq!(fetcher.fetch_count(&oci("0.1.2")), 1);

        let refreshing =
            SourceCache::new(home, StorageScheme::Legacy, fetcher.clone()).with_refresh(true);
        refreshing.ensure_fetched(&oci("0.1.2")).unwrap();
        refreshing.ensure_fetched(&oci("0.1.2")).unwrap();
        assert_eq!(fetcher.fetch_count(&oci("0.1.2")), 2);
    }

    #[test]
    fn test_fetch_waits_for_home_lock() {
        let tmp = TempDir::new().unwrap();
        let artifact = tmp.path().join("artifact");
        write_module(&artifact, "helloworld", "0.1.2", &[]);
        let home = tmp.path().join("home");

        let (shell, _) = Shell::capture();
        let fetcher = Arc::new(
            FixtureFetcher::new(Arc::new(shell)).with_artifact(&oci("0.1.2"), &artifact),
        );
        let cache = SourceCache::new(home.clone(), StorageScheme::Legacy, fetcher.clone());

        let held = HomeLock::acquire(&home).unwrap();
        std::thread::scope(|s| {
            let handle = s.spawn(|| cache.ensure_fetched(&oci("0.1.2")).unwrap());
            std::thread::sleep(Duration::from_millis(150));
            assert_eq!(fetcher.fetch_count(&oci("0.1.2")), 0);

            drop(held);
            let path = handle.join().unwrap();
            assert!(path.join("kcl.mod").is_file());
        });
        assert_eq!(fetcher.fetch_count(&oci("0.1.2")), 1);
    }

    #[test]
    fn test_cached_source_is_read_without_home_lock() {
        let tmp = TempDir::new().unwrap();
        let artifact = tmp.path().join("artifact");
        write_module(&artifact, "helloworld", "0.1.2", &[]);
        let home = tmp.path().join("home");

        let (shell, _) = Shell::capture();
        let fetcher = Arc::new(
            FixtureFetcher::new(Arc::new(shell)).with_artifact(&oci("0.1.2"), &artifact),
        );
        SourceCache::new(home.clone(), StorageScheme::Legacy, fetcher.clone())
            .ensure_fetched(&oci("0.1.2"))
            .unwrap();

        let _held = HomeLock::acquire(&home).unwrap();
        let cache = SourceCache::new(home.clone(), StorageScheme::Legacy, fetcher.clone());
        let path = cache.ensure_fetched(&oci("0.1.2")).unwrap();
        assert_eq!(path, home.join("helloworld_0.1.2"));
        assert_eq!(fetcher.fetch_count(&oci("0.1.2")), 1);
    }

    #[test]
    fn test_failed_fetch_leaves_no_cache_entry() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let (shell, _) = Shell::capture();
        let fetcher = Arc::new(FixtureFetcher::new(Arc::new(shell)));
        let cache = SourceCache::new(home.clone(), StorageScheme::Legacy, fetcher);

        let err = cache.ensure_fetched(&oci("9.9.9")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::SourceFetch { .. })
        ));
        assert!(!home.join("helloworld_9.9.9").exists());
        let leftovers: Vec<_> = std::fs::read_dir(&home)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != crate::util::flock::LOCK_FILE_NAME)
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_local_sources_are_used_in_place() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("lib");
        write_module(&local, "lib", "0.1.0", &[]);

        let (shell, buffer) = Shell::capture();
        let fetcher = Arc::new(FixtureFetcher::new(Arc::new(shell)));
        let cache = SourceCache::new(tmp.path().join("home"), StorageScheme::Legacy, fetcher);

        let path = cache.ensure_fetched(&SourceId::for_path(&local)).unwrap();
        assert_eq!(path, local);
        assert!(captured(&buffer).is_empty());
    }

    #[test]
    fn test_nested_git_package() {
        let tmp = TempDir::new().unwrap();
        let repo = crate::test_support::GitFixture::init(&tmp.path().join("repo"), "flask", "0.0.1");
        repo.commit_files(
            "refs/heads/test-branch-without-modfile",
            &[
                ("aa/kcl.mod", "[package]\nname = \"aa\"\nversion = \"0.0.1\"\n"),
                ("aa/cc/kcl.mod", "[package]\nname = \"cc\"\nversion = \"0.0.1\"\n"),
            ],
        );

        let (shell, _) = Shell::capture();
        let fetcher = Arc::new(FixtureFetcher::new(Arc::new(shell)));
        let home = tmp.path().join("home");
        let cache = SourceCache::new(home.clone(), StorageScheme::Legacy, fetcher);

        let source = SourceId::for_git(
            repo.url(),
            GitReference::Branch("test-branch-without-modfile".into()),
        );
        let path = cache.ensure_package("cc", &source).unwrap();
        assert_eq!(path, home.join("repo_test-branch-without-modfile/aa/cc"));

        let explicit = source.with_package("aa");
        assert_eq!(
            cache.ensure_package("whatever", &explicit).unwrap(),
            home.join("repo_test-branch-without-modfile/aa")
        );
    }
}
