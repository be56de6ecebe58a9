//! Git fetcher - dependencies from git repositories.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use git2::build::RepoBuilder;
use git2::{Repository, ResetType};

use crate::core::source_id::GitReference;
use crate::core::SourceId;
use crate::sources::Fetcher;
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::Shell;

/// Clones git sources with libgit2.
///
/// The checkout is detached at the requested reference and its `.git`
/// directory is removed: the cache holds source trees, not repositories.
pub struct GitFetcher {
    shell: Arc<Shell>,
}

impl GitFetcher {
    pub fn new(shell: Arc<Shell>) -> Self {
        GitFetcher { shell }
    }

    fn clone_repo(&self, url: &str, reference: &GitReference, dest: &Path) -> Result<()> {
        let repo = match reference {
            GitReference::Branch(branch) => RepoBuilder::new()
                .branch(branch)
                .clone(url, dest)
                .with_context(|| format!("failed to clone {} with branch {}", url, branch))?,
            _ => Repository::clone(url, dest)
                .with_context(|| format!("failed to clone {}", url))?,
        };

        match reference {
            GitReference::Tag(name) | GitReference::Commit(name) => {
                checkout(&repo, reference.kind(), name)?;
            }
            GitReference::DefaultBranch | GitReference::Branch(_) => {}
        }

        Ok(())
    }
}

/// Hard-reset the working tree to a tag or (possibly abbreviated) commit.
fn checkout(repo: &Repository, kind: &str, spec: &str) -> Result<()> {
    let object = repo
        .revparse_single(spec)
        .with_context(|| format!("{} `{}` not found", kind, spec))?;
    let commit = object
        .peel_to_commit()
        .with_context(|| format!("{} `{}` does not point to a commit", kind, spec))?;

    tracing::debug!("checking out {} {} at {}", kind, spec, commit.id());
    repo.reset(commit.as_object(), ResetType::Hard, None)
        .with_context(|| format!("failed to check out {} `{}`", kind, spec))?;
    repo.set_head_detached(commit.id())?;

    Ok(())
}

impl Fetcher for GitFetcher {
    fn fetch(&self, source: &SourceId, dest: &Path) -> Result<()> {
        let SourceId::Git { url, reference, .. } = source else {
            bail!("not a git source: {}", source);
        };

        match reference {
            GitReference::DefaultBranch => self.shell.line(format!("cloning '{}'", url)),
            GitReference::Branch(b) => {
                self.shell.line(format!("cloning '{}' with branch '{}'", url, b))
            }
            GitReference::Tag(t) => self.shell.line(format!("cloning '{}' with tag '{}'", url, t)),
            GitReference::Commit(c) => {
                self.shell.line(format!("cloning '{}' with commit '{}'", url, c))
            }
        }

        self.clone_repo(url, reference, dest)?;
        remove_dir_all_if_exists(&dest.join(".git"))?;

        Ok(())
    }
}
