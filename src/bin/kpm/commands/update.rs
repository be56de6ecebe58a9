//! `kpm update` command

use anyhow::Result;

use crate::cli::UpdateArgs;
use crate::GlobalOptions;
use kpm::ops::kpm_update::update;
use kpm::util::Status;

pub fn execute(args: UpdateArgs, global_opts: &GlobalOptions) -> Result<()> {
    let ctx = global_opts.context()?;
    let module_dir = match args.dir {
        Some(dir) => ctx.cwd().join(dir),
        None => super::module_dir(&ctx)?,
    };

    let result = update(&ctx, &module_dir)?;
    ctx.shell().status(
        Status::Updated,
        format!("{} ({} packages)", result.lock().path().display(), result.resolve().len()),
    );
    Ok(())
}
