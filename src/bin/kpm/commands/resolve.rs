//! `kpm resolve` command

use anyhow::Result;

use crate::cli::ResolveArgs;
use crate::GlobalOptions;
use kpm::core::SourceId;
use kpm::ops::resolve::{resolve_module, run, ResolveOptions};
use kpm::util::Status;

pub fn execute(args: ResolveArgs, global_opts: &GlobalOptions) -> Result<()> {
    let ctx = global_opts.context()?;

    let result = match args.source {
        Some(ref source) => run(&ctx, &SourceId::parse(source)?)?,
        None => {
            let module_dir = super::module_dir(&ctx)?;
            let opts = ResolveOptions {
                update_lock: false,
                locked: args.locked,
            };
            resolve_module(&ctx, &module_dir, opts)?
        }
    };

    for (name, path) in result.dependency_map() {
        println!("{} {}", name, path.display());
    }
    ctx.shell().status(
        Status::Resolved,
        format!("{} packages for {}", result.resolve().len(), result.resolve().root_name()),
    );
    Ok(())
}
