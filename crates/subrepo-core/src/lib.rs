//! Subrepo tracking for git
//!
//! Embeds other repositories into a host repository as ordinary commits.
//! Which subrepos exist is never stored anywhere else: it is reconstructed
//! from the `Subrepo-*` trailers of the host's history on every call.

pub mod cleanup;
pub mod config;
pub mod delete;
pub mod engine;
pub mod error;
pub mod git;
pub mod graph;
pub mod import;
pub mod memory;
pub mod message;
pub mod oracle;
pub mod prefix;
pub mod reimport;
pub mod render;
pub mod scan;
pub mod snapshot;

pub use config::SubrepoConfig;
pub use delete::{DeleteOptions, DeleteOutcome};
pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
pub use git::GitOracle;
pub use graph::{DependencyGraph, SubrepoKey};
pub use import::{ImportOptions, ImportOutcome};
pub use memory::MemoryOracle;
pub use message::{Descriptor, MessageCodec, MessageEditor, Operation, TrailerCodec};
pub use oracle::{Author, CommitId, Oracle};
pub use prefix::Prefix;
pub use reimport::{MatchCandidate, MatchedBy, ReimportOptions, ReimportOutcome, ReimportReport};
pub use render::{TreeNode, render_tree, tree_nodes};
pub use scan::{Absorbed, Forest, Scanner, Subrepo};
