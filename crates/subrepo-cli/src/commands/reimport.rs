//! Reimport command implementation

use colored::Colorize;
use subrepo_core::{ReimportOptions, ReimportOutcome};

use crate::context::RepoContext;
use crate::error::Result;

/// Run the reimport command
pub fn run_reimport(
    ctx: &RepoContext,
    subrepo: &str,
    prefix: &str,
    branch: Option<String>,
    use_date: bool,
    verbose: bool,
) -> Result<()> {
    let prefix = ctx.prefix(prefix)?;
    let config = ctx.config(false, use_date)?;
    let options = ReimportOptions {
        branch,
        use_date: config.use_date,
    };

    let report = ctx.engine().reimport(subrepo, &prefix, &options)?;

    if verbose {
        println!("{}:", "Searched branches".bold());
        for branch in &report.searched {
            println!("  {}/{}", subrepo, branch);
        }
        println!("{}:", "Candidates".bold());
        for candidate in &report.candidates {
            println!("  {candidate}");
        }
        println!();
    }

    match report.outcome {
        ReimportOutcome::Amended {
            commit,
            replaced,
            descriptor,
        } => {
            println!(
                "{} '{}' at '{}' to {}",
                "Reimported".green().bold(),
                descriptor.remote.cyan(),
                descriptor.prefix,
                descriptor.commit.short()
            );
            println!(
                "{}:  {} (was {})",
                "Commit".dimmed(),
                commit.short(),
                replaced.short()
            );
        }
        ReimportOutcome::UpToDate { descriptor } => {
            println!(
                "Subrepo '{}' at '{}' already imports the matching commit ({})",
                descriptor.remote.cyan(),
                descriptor.prefix,
                descriptor.commit.short()
            );
        }
    }
    Ok(())
}
