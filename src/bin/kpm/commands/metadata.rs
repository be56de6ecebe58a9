//! `kpm metadata` command

use anyhow::Result;

use crate::cli::MetadataArgs;
use crate::GlobalOptions;
use kpm::ops::resolve::{resolve_module, ResolveOptions};

pub fn execute(args: MetadataArgs, global_opts: &GlobalOptions) -> Result<()> {
    let ctx = global_opts.context()?;
    let module_dir = super::module_dir(&ctx)?;

    let opts = ResolveOptions {
        update_lock: args.update,
        locked: false,
    };
    let result = resolve_module(&ctx, &module_dir, opts)?;
    println!("{}", result.summary_json()?);
    Ok(())
}
