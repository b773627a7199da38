//! Repository context detection
//!
//! Finds the git repository from the working directory (or `-C`), like git
//! itself, and turns prefix arguments typed relative to that directory into
//! repository prefixes.

use std::path::{Path, PathBuf};

use git2::ErrorCode;
use subrepo_core::{Engine, GitOracle, Prefix, SubrepoConfig};

use crate::error::{CliError, Result};

/// The repository a command operates on.
pub struct RepoContext {
    oracle: GitOracle,
    /// Root of the working tree
    workdir: PathBuf,
    /// Directory prefix arguments are relative to
    cwd: PathBuf,
}

impl RepoContext {
    /// Discover the repository containing `start`, or the current directory.
    pub fn open(start: Option<&Path>) -> Result<Self> {
        let cwd = match start {
            Some(path) => std::fs::canonicalize(path)?,
            None => std::fs::canonicalize(std::env::current_dir()?)?,
        };

        let oracle = match GitOracle::discover(&cwd) {
            Ok(oracle) => oracle,
            Err(subrepo_core::Error::Git(e)) if e.code() == ErrorCode::NotFound => {
                return Err(CliError::user(format!(
                    "Not a git repository: {}",
                    cwd.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let workdir = oracle
            .workdir()
            .ok_or_else(|| CliError::user("This operation must be run in a work tree"))?;
        let workdir = std::fs::canonicalize(workdir)?;

        tracing::debug!(workdir = %workdir.display(), cwd = %cwd.display(), "Opened repository");
        Ok(Self {
            oracle,
            workdir,
            cwd,
        })
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(&self.oracle)
    }

    /// Resolve a prefix argument against the directory the command runs in.
    pub fn prefix(&self, input: &str) -> Result<Prefix> {
        Ok(Prefix::from_user_path(&self.workdir, &self.cwd, input)?)
    }

    /// Git configured defaults combined with command-line flags.
    pub fn config(&self, edit: bool, use_date: bool) -> Result<SubrepoConfig> {
        Ok(self.oracle.config()?.with_flags(edit, use_date))
    }
}
