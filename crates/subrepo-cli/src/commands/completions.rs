//! Shell completion generation

use std::io;

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::Cli;

/// Write the completion script for `shell` to stdout.
pub fn run_completions(shell: Shell) {
    let mut command = Cli::command();
    generate(shell, &mut command, "git-subrepo", &mut io::stdout());
}
