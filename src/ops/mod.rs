//! High-level operations.
//!
//! This module contains the implementation of kpm commands.

pub mod kpm_add;
pub mod kpm_update;
pub mod lockfile;
pub mod resolve;

pub use kpm_add::{add_dependency, AddOptions, AddResult};
pub use kpm_update::update;
pub use lockfile::{persist, reconcile};
pub use resolve::{resolve_module, run, ResolveOptions, ResolveResult};
