//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kpm::util::shell::ColorChoice;
use kpm::util::{StorageScheme, VersionStrategy};

/// kpm - dependency resolution for KCL modules
#[derive(Parser)]
#[command(name = "kpm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print contract lines and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always or never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Package cache root (defaults to KCL_PKG_PATH)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Cache layout: legacy or content-addressed
    #[arg(long, global = true)]
    pub storage: Option<StorageScheme>,

    /// Version selection: override or mvs
    #[arg(long, global = true)]
    pub strategy: Option<VersionStrategy>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a dependency to kcl.mod
    Add(AddArgs),

    /// Re-fetch dependencies and rewrite kcl.mod.lock
    Update(UpdateArgs),

    /// Print the resolved packages as JSON
    Metadata(MetadataArgs),

    /// Print the resolved packages as `name path` lines
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct AddArgs {
    /// Registry package as `name:version`
    #[arg(conflicts_with_all = ["git", "oci", "path"])]
    pub spec: Option<String>,

    /// Git repository URL
    #[arg(long, conflicts_with_all = ["oci", "path"])]
    pub git: Option<String>,

    /// Git branch
    #[arg(long, requires = "git", conflicts_with_all = ["tag", "commit"])]
    pub branch: Option<String>,

    /// Git tag, or the tag of an OCI artifact
    #[arg(long, conflicts_with = "commit")]
    pub tag: Option<String>,

    /// Git commit
    #[arg(long, requires = "git")]
    pub commit: Option<String>,

    /// Package to pick from a repository holding several
    #[arg(long, requires = "git")]
    pub package: Option<String>,

    /// OCI reference, e.g. oci://ghcr.io/kcl-lang/k8s
    #[arg(long, requires = "tag", conflicts_with = "path")]
    pub oci: Option<String>,

    /// Path to a local module
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Module directory (defaults to the one containing the current directory)
    pub dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct MetadataArgs {
    /// Write kcl.mod.lock after resolving
    #[arg(long)]
    pub update: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Resolve a remote module instead, e.g. `oci+oci://ghcr.io/kcl-lang/k8s?tag=1.28`
    #[arg(long)]
    pub source: Option<String>,

    /// Fail if a locked package would change source
    #[arg(long)]
    pub locked: bool,
}
