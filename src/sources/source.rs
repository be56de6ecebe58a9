//! Fetcher trait - common interface for materializing package sources.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::core::SourceId;
use crate::sources::{GitFetcher, OciFetcher};
use crate::util::Shell;

/// Downloads the content of a remote source.
///
/// `fetch` always performs a physical fetch into `dest`, an empty directory
/// that the caller later moves into the cache. Deciding whether a fetch is
/// needed at all, and deduplicating concurrent requests, is the job of
/// [`SourceCache`](crate::sources::SourceCache).
///
/// Implementations write exactly one line to the operation's shell per call,
/// before any network traffic.
pub trait Fetcher: Send + Sync {
    /// Materialize `source` into `dest`.
    fn fetch(&self, source: &SourceId, dest: &Path) -> Result<()>;
}

/// Dispatches each source kind to its transport.
pub struct DefaultFetcher {
    git: GitFetcher,
    oci: OciFetcher,
}

impl DefaultFetcher {
    pub fn new(shell: Arc<Shell>) -> Self {
        DefaultFetcher {
            git: GitFetcher::new(Arc::clone(&shell)),
            oci: OciFetcher::new(shell),
        }
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, source: &SourceId, dest: &Path) -> Result<()> {
        match source {
            SourceId::Git { .. } => self.git.fetch(source, dest),
            SourceId::Oci { .. } => self.oci.fetch(source, dest),
            SourceId::Local { path } => {
                bail!("local source `{}` is never fetched", path.display())
            }
        }
    }
}
