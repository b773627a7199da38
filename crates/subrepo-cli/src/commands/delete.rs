//! Delete command implementation

use colored::Colorize;
use subrepo_core::message::Verbatim;
use subrepo_core::{DeleteOptions, MessageEditor};

use crate::context::RepoContext;
use crate::editor::LaunchEditor;
use crate::error::Result;

/// Run the delete command
pub fn run_delete(ctx: &RepoContext, subrepo: &str, prefix: &str, edit: bool) -> Result<()> {
    let prefix = ctx.prefix(prefix)?;
    let config = ctx.config(edit, false)?;
    let editor: &dyn MessageEditor = if config.edit { &LaunchEditor } else { &Verbatim };

    let outcome = ctx
        .engine()
        .delete(subrepo, &prefix, &DeleteOptions { editor })?;

    println!(
        "{} '{}' at '{}'",
        "Deleted".green().bold(),
        outcome.descriptor.remote.cyan(),
        outcome.descriptor.prefix
    );
    for removed in &outcome.removed {
        println!("  {} {}", "-".red(), removed);
    }
    for retained in &outcome.retained {
        println!("  {} {} (still needed)", "=".yellow(), retained);
    }
    println!("{}:  {}", "Commit".dimmed(), outcome.commit.short());
    Ok(())
}
