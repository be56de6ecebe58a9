//! kpm CLI - dependency resolution for KCL modules

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use kpm::resolver::ResolveError;
use kpm::util::shell::ColorChoice;
use kpm::util::{GlobalContext, Shell, StorageScheme, VersionStrategy};

/// Options shared by every subcommand.
pub struct GlobalOptions {
    pub quiet: bool,
    pub color: ColorChoice,
    pub home: Option<PathBuf>,
    pub storage: Option<StorageScheme>,
    pub strategy: Option<VersionStrategy>,
}

impl GlobalOptions {
    /// Build the context for this invocation. Flags override the
    /// environment, which overrides `<home>/config.toml`.
    pub fn context(&self) -> Result<GlobalContext> {
        let mut shell = Shell::new(self.color);
        shell.set_quiet(self.quiet);

        let mut ctx = GlobalContext::new()?.with_shell(shell);
        if let Some(ref home) = self.home {
            ctx = ctx.with_home(home.clone());
        }

        let mut config = ctx.resolve_config();
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        Ok(ctx.with_resolve_config(config))
    }
}

fn main() {
    if let Err(e) = run() {
        match e.downcast_ref::<ResolveError>() {
            Some(err) => eprint!("{}", err.to_diagnostic()),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("kpm=debug")
    } else {
        EnvFilter::new("kpm=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = GlobalOptions {
        quiet: cli.quiet,
        color: cli.color,
        home: cli.home,
        storage: cli.storage,
        strategy: cli.strategy,
    };

    match cli.command {
        Commands::Add(args) => commands::add::execute(args, &global),
        Commands::Update(args) => commands::update::execute(args, &global),
        Commands::Metadata(args) => commands::metadata::execute(args, &global),
        Commands::Resolve(args) => commands::resolve::execute(args, &global),
    }
}
