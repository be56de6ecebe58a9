//! `kpm add` command

use anyhow::{bail, Context, Result};

use crate::cli::AddArgs;
use crate::GlobalOptions;
use kpm::core::{GitReference, SourceId};
use kpm::ops::kpm_add::{add_dependency, AddOptions};
use kpm::util::fs::normalize_path;
use kpm::util::GlobalContext;

pub fn execute(args: AddArgs, global_opts: &GlobalOptions) -> Result<()> {
    let ctx = global_opts.context()?;
    let module_dir = super::module_dir(&ctx)?;

    let opts = add_options(&args, &ctx)?;
    add_dependency(&ctx, &module_dir, &opts)?;
    Ok(())
}

/// Turn the command-line source flags into a source descriptor.
fn add_options(args: &AddArgs, ctx: &GlobalContext) -> Result<AddOptions> {
    if let Some(ref url) = args.git {
        let reference = match (&args.branch, &args.tag, &args.commit) {
            (Some(branch), None, None) => GitReference::Branch(branch.clone()),
            (None, Some(tag), None) => GitReference::Tag(tag.clone()),
            (None, None, Some(commit)) => GitReference::Commit(commit.clone()),
            (None, None, None) => GitReference::DefaultBranch,
            _ => bail!("only one of --branch, --tag and --commit may be given"),
        };
        let mut source = SourceId::for_git(url.clone(), reference);
        if let Some(ref package) = args.package {
            source = source.with_package(package.clone());
        }
        return Ok(AddOptions::new(source));
    }

    if let Some(ref reference) = args.oci {
        let tag = args.tag.as_deref().context("--oci requires --tag")?;
        return Ok(AddOptions::new(SourceId::for_oci_url(reference, tag)?));
    }

    if let Some(ref path) = args.path {
        let path = normalize_path(&ctx.cwd().join(path));
        return Ok(AddOptions::new(SourceId::for_path(&path)));
    }

    if let Some(ref spec) = args.spec {
        let (name, version) = spec
            .split_once(':')
            .filter(|(n, v)| !n.is_empty() && !v.is_empty())
            .with_context(|| format!("expected `name:version`, found `{}`", spec))?;
        let registry = &ctx.config().registry;
        let source = SourceId::for_oci(
            registry.host.clone(),
            format!("{}/{}", registry.namespace, name),
            version,
        );
        return Ok(AddOptions {
            source,
            name: Some(name.to_string()),
        });
    }

    bail!("nothing to add; pass `name:version`, --git, --oci or --path")
}
