//! Error types for subrepo-core

use std::fmt;

use crate::graph::SubrepoKey;
use crate::oracle::CommitId;
use crate::reimport::MatchCandidate;

/// Result type for subrepo-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad class of an [`Error`], used by front ends to pick an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments or repository state; nothing was changed.
    UserInput,
    /// More than one answer was possible and the tool refused to guess.
    Ambiguity,
    /// Subrepo metadata in history is corrupt.
    Integrity,
    /// The underlying version-control system failed.
    Oracle,
}

/// Errors that can occur in subrepo operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("{operation} failed: {message}")]
    Oracle { operation: String, message: String },

    #[error("Remote '{name}' not found")]
    RemoteNotFound { name: String },

    #[error("Branch '{branch}' not found in remote '{remote}'")]
    BranchNotFound { remote: String, branch: String },

    #[error("Revision '{revision}' not found for remote '{remote}'")]
    RevisionNotFound { remote: String, revision: String },

    #[error("Commit {commit} not found in remote '{remote}' (use --force to import anyway)")]
    CommitNotInRemote { remote: String, commit: CommitId },

    #[error("Commit {commit} is not available locally; fetch the remote that provides it")]
    CommitUnavailable { commit: CommitId },

    #[error("Invalid prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    #[error("Subrepo '{remote}' not found at '{prefix}'")]
    SubrepoNotFound { remote: String, prefix: String },

    #[error("Prefix '{prefix}' holds subrepo '{found}', not '{remote}'")]
    SubrepoMismatch {
        remote: String,
        prefix: String,
        found: String,
    },

    #[error("HEAD is not a subrepo import{}", detail_suffix(.detail))]
    NotAnImport { detail: String },

    #[error("Your index contains uncommitted changes; commit or stash them")]
    DirtyIndex,

    #[error("No commit matching '{subject}' found in remote '{remote}'")]
    NoMatch { remote: String, subject: String },

    #[error("Aborted: {reason}")]
    Aborted { reason: String },

    #[error("Found {} distinct commits matching the imported one; pick a branch:\n{}", .candidates.len(), CandidateList(.candidates))]
    AmbiguousMatch { candidates: Vec<MatchCandidate> },

    #[error("Subrepo '{}' at '{}' is still needed by: {}", .subrepo.remote, .subrepo.prefix, KeyList(.importers))]
    StillReferenced {
        subrepo: SubrepoKey,
        importers: Vec<SubrepoKey>,
    },

    #[error("Importing at '{prefix}' would overwrite content of: {}", KeyList(.conflicts))]
    Overlap {
        prefix: String,
        conflicts: Vec<SubrepoKey>,
    },

    #[error("Malformed subrepo metadata{}: {reason}", commit_suffix(.commit))]
    MalformedMessage {
        commit: Option<CommitId>,
        reason: String,
    },
}

impl Error {
    /// The error class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Git(_) | Error::Oracle { .. } => ErrorKind::Oracle,
            Error::AmbiguousMatch { .. }
            | Error::StillReferenced { .. }
            | Error::Overlap { .. } => ErrorKind::Ambiguity,
            Error::MalformedMessage { .. } => ErrorKind::Integrity,
            _ => ErrorKind::UserInput,
        }
    }

    pub(crate) fn oracle(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Oracle {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedMessage {
            commit: None,
            reason: reason.into(),
        }
    }

    /// Attach the commit a metadata error was found in.
    pub(crate) fn in_commit(self, id: &CommitId) -> Self {
        match self {
            Error::MalformedMessage {
                commit: None,
                reason,
            } => Error::MalformedMessage {
                commit: Some(id.clone()),
                reason,
            },
            other => other,
        }
    }
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}

fn commit_suffix(commit: &Option<CommitId>) -> String {
    commit
        .as_ref()
        .map(|c| format!(" in commit {c}"))
        .unwrap_or_default()
}

struct KeyList<'a>(&'a [SubrepoKey]);

impl fmt::Display for KeyList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|k| k.to_string()).collect();
        f.write_str(&names.join(", "))
    }
}

struct CandidateList<'a>(&'a [MatchCandidate]);

impl fmt::Display for CandidateList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, candidate) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {candidate}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::DirtyIndex.kind(), ErrorKind::UserInput);
        assert_eq!(
            Error::malformed("missing Subrepo-Commit").kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            Error::oracle("checkout", "locked").kind(),
            ErrorKind::Oracle
        );
        assert_eq!(
            Error::AmbiguousMatch { candidates: vec![] }.kind(),
            ErrorKind::Ambiguity
        );
    }

    #[test]
    fn test_malformed_in_commit() {
        let id = CommitId::new("0123456789abcdef0123456789abcdef01234567");
        let err = Error::malformed("duplicate Subrepo-Prefix").in_commit(&id);
        let text = err.to_string();
        assert!(text.contains("in commit 0123456789abcdef"));
        assert!(text.contains("duplicate Subrepo-Prefix"));
    }

    #[test]
    fn test_not_an_import_detail() {
        let bare = Error::NotAnImport {
            detail: String::new(),
        };
        assert_eq!(bare.to_string(), "HEAD is not a subrepo import");

        let detailed = Error::NotAnImport {
            detail: "it imports 'lib' at 'src'".into(),
        };
        assert!(detailed.to_string().ends_with("(it imports 'lib' at 'src')"));
    }
}
