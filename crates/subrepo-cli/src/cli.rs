//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// git-subrepo - Embed other repositories as plain commits
#[derive(Parser, Debug)]
#[command(name = "git-subrepo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run as if started in this directory
    #[arg(
        short = 'C',
        long = "repository",
        global = true,
        env = "GIT_SUBREPO_DIR",
        value_name = "PATH"
    )]
    pub repository: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Import or update a subrepo from a fetched remote
    ///
    /// The content of REVISION replaces whatever the subrepo at PREFIX held
    /// before, recorded as one ordinary commit on top of HEAD.
    ///
    /// Examples:
    ///   git subrepo import lib src/lib main     # Track lib's main branch
    ///   git subrepo import lib src/lib v2.0     # Move to a tag or older commit
    ///   git subrepo import vendor . main        # Import at the repository root
    Import {
        /// Name of the git remote to import from
        remote: String,

        /// Directory to place the content in, relative to the current directory
        prefix: String,

        /// Branch of the remote, or any revision
        revision: String,

        /// Edit the commit message before committing
        #[arg(short, long)]
        edit: bool,

        /// Import even if no branch of the remote contains the revision
        #[arg(short, long)]
        force: bool,
    },

    /// Delete a subrepo and the dependencies only it needed
    Delete {
        /// Remote the subrepo was imported from
        subrepo: String,

        /// Directory the subrepo lives in
        prefix: String,

        /// Edit the commit message before committing
        #[arg(short, long)]
        edit: bool,
    },

    /// Re-point the import at HEAD to its rebased upstream commit
    ///
    /// Meant for interactive rebases: HEAD must be the import of SUBREPO at
    /// PREFIX. It is amended in place to import the remote commit with the
    /// same subject.
    Reimport {
        /// Remote the subrepo was imported from
        subrepo: String,

        /// Directory the subrepo lives in
        prefix: String,

        /// Only search this branch of the remote
        #[arg(short, long)]
        branch: Option<String>,

        /// Match by author date when no subject matches
        #[arg(long)]
        use_date: bool,
    },

    /// Show the subrepos of the current branch
    Tree {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
