//! kpm - dependency resolution for KCL modules
//!
//! This crate resolves the dependencies of a KCL module from git
//! repositories, OCI registries and local directories into a reproducible
//! set of packages, and keeps `kcl.mod.lock` in step with it.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Fixtures for kpm unit tests: module directories, local git repositories
/// and an offline fetcher.
#[cfg(test)]
pub mod test_support;

pub use core::{Dependency, Manifest, Package, SourceId};

pub use resolver::Resolve;
pub use util::context::GlobalContext;
