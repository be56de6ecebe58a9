//! Package sources.
//!
//! Sources are responsible for bringing packages onto local disk: deriving
//! their cache path, fetching them from git repositories or OCI registries,
//! and validating local module directories.

pub mod cache;
pub mod git;
pub mod oci;
pub mod path;
pub mod source;
pub mod storage;

pub use cache::SourceCache;
pub use git::GitFetcher;
pub use oci::OciFetcher;
pub use source::{DefaultFetcher, Fetcher};
pub use storage::resolve_path;
