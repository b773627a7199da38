//! Import command implementation

use colored::Colorize;
use subrepo_core::message::Verbatim;
use subrepo_core::{ImportOptions, ImportOutcome, MessageEditor};

use crate::context::RepoContext;
use crate::editor::LaunchEditor;
use crate::error::Result;

/// Run the import command
pub fn run_import(
    ctx: &RepoContext,
    remote: &str,
    prefix: &str,
    revision: &str,
    edit: bool,
    force: bool,
) -> Result<()> {
    let prefix = ctx.prefix(prefix)?;
    let config = ctx.config(edit, false)?;
    let editor: &dyn MessageEditor = if config.edit { &LaunchEditor } else { &Verbatim };
    let options = ImportOptions { force, editor };

    match ctx.engine().import(remote, &prefix, revision, &options)? {
        ImportOutcome::Committed {
            commit,
            descriptor,
            dependencies,
        } => {
            println!(
                "{} '{}' at '{}' ({})",
                "Imported".green().bold(),
                descriptor.remote.cyan(),
                descriptor.prefix,
                descriptor.commit.short()
            );
            for dependency in &dependencies {
                println!("  {} {}", "+".green(), dependency);
            }
            println!("{}:  {}", "Commit".dimmed(), commit.short());
        }
        ImportOutcome::UpToDate { descriptor } => {
            println!(
                "Subrepo '{}' at '{}' is already up to date ({})",
                descriptor.remote.cyan(),
                descriptor.prefix,
                descriptor.commit.short()
            );
        }
    }
    Ok(())
}
