//! Persistent defaults read from git configuration
//!
//! git already layers system, global and repository configuration, so the
//! defaults live under a `subrepo.` section there:
//!
//! ```text
//! [subrepo]
//!     edit = true
//!     useDate = true
//! ```
//!
//! Command-line flags can only switch an option on, never off.

use git2::{Config, ErrorCode};
use serde::Serialize;

use crate::Result;

pub const EDIT_KEY: &str = "subrepo.edit";
pub const USE_DATE_KEY: &str = "subrepo.useDate";

/// Effective subrepo defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubrepoConfig {
    /// Open the editor for every import and delete message
    pub edit: bool,

    /// Let reimport fall back to matching by author date
    pub use_date: bool,
}

impl SubrepoConfig {
    /// Read the defaults from a (usually layered) git configuration.
    pub fn from_git(config: &Config) -> Result<Self> {
        Ok(Self {
            edit: read_bool(config, EDIT_KEY)?,
            use_date: read_bool(config, USE_DATE_KEY)?,
        })
    }

    /// Combine with command-line flags.
    pub fn with_flags(self, edit: bool, use_date: bool) -> Self {
        Self {
            edit: self.edit || edit,
            use_date: self.use_date || use_date,
        }
    }
}

fn read_bool(config: &Config, key: &str) -> Result<bool> {
    match config.get_bool(key) {
        Ok(value) => Ok(value),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
