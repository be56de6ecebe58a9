//! Core data structures for kpm.
//!
//! This module contains the foundational types used throughout kpm:
//! - Source descriptors (SourceId)
//! - Manifests and dependencies
//! - On-disk module layout

pub mod dependency;
pub mod manifest;
pub mod package;
pub mod source_id;
pub mod workspace;

pub use dependency::{Dependency, DependencySpec};
pub use manifest::Manifest;
pub use package::Package;
pub use source_id::{GitReference, SourceId};
pub use workspace::{find_manifest, locate_package, LOCKFILE_NAME, MANIFEST_NAME};
