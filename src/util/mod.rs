//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod flock;
pub mod fs;
pub mod hash;
pub mod shell;

pub use config::{Config, ResolveConfig, StorageScheme, VersionStrategy};
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
pub use flock::HomeLock;
pub use shell::{Shell, Status};
