//! Shared test utilities for the git-subrepo workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: [`git::GitRepo`], a temporary repository driven through the
//!   `git` CLI
//! - [`upstream`]: ready-made upstream repositories for subrepo scenarios

pub mod git;
pub mod upstream;

pub use git::GitRepo;
