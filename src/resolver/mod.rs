//! Dependency resolution.
//!
//! Resolution runs in two phases. The graph builder fetches and loads every
//! manifest reachable from the root; all I/O happens there. Version selection
//! then reduces the graph to one package per name and is pure and
//! deterministic.

pub mod encode;
pub mod errors;
pub mod graph;
pub mod resolve;
pub mod select;
pub mod version;

pub use encode::{LockEntry, LockFile};
pub use errors::ResolveError;
pub use graph::{GraphBuilder, ResolutionGraph};
pub use resolve::{Resolve, ResolvedPackage};
pub use select::select;
