//! git-subrepo
//!
//! Command-line front end of subrepo-core. Installed on the `PATH`, it is
//! also reachable as `git subrepo`.

mod cli;
mod commands;
mod context;
mod editor;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::RepoContext;
use error::Result;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

/// Log to stderr, at `warn` unless `RUST_LOG` or `--verbose` say otherwise.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        println!("{} Embed other repositories as plain commits", "git-subrepo".green().bold());
        println!();
        println!("Run {} for available commands.", "git-subrepo --help".cyan());
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        commands::run_completions(shell);
        return Ok(());
    }

    let ctx = RepoContext::open(cli.repository.as_deref())?;
    match command {
        Commands::Import {
            remote,
            prefix,
            revision,
            edit,
            force,
        } => commands::run_import(&ctx, &remote, &prefix, &revision, edit, force),
        Commands::Delete {
            subrepo,
            prefix,
            edit,
        } => commands::run_delete(&ctx, &subrepo, &prefix, edit),
        Commands::Reimport {
            subrepo,
            prefix,
            branch,
            use_date,
        } => commands::run_reimport(&ctx, &subrepo, &prefix, branch, use_date, cli.verbose),
        Commands::Tree { json } => commands::run_tree(&ctx, json),
        Commands::Completions { .. } => Ok(()),
    }
}
