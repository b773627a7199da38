//! Version-control oracle trait
//!
//! Every engine talks to the version-control system exclusively through
//! [`Oracle`]. The production implementation is [`crate::git::GitOracle`];
//! [`crate::memory::MemoryOracle`] keeps everything in memory for tests.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::Result;
use crate::snapshot::Snapshot;

/// Full hexadecimal identifier of a commit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for human consumption.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who wrote a commit, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
    /// Author timestamp in the author's own UTC offset
    pub when: DateTime<FixedOffset>,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Information about a single commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,

    /// Full, raw commit message
    pub message: String,

    /// Author timestamp (survives rebases, unlike the committer's)
    pub time: DateTime<Utc>,

    pub author: Author,

    pub parents: Vec<CommitId>,
}

impl CommitInfo {
    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim_end()
    }
}

/// A remote-tracking branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    /// Branch name without the remote part (`master`, not `lib/master`)
    pub name: String,
    pub tip: CommitId,
}

/// Lazily walked commit ancestry, newest first.
pub type CommitWalk<'a> = Box<dyn Iterator<Item = Result<CommitId>> + 'a>;

/// Operations the subrepo engines need from the version-control system.
///
/// Implementations never touch the network: remotes are expected to be
/// fetched already. Only [`Oracle::checkout`], [`Oracle::restore`] and
/// [`Oracle::set_head`] modify user visible state; everything else either
/// reads or writes unreferenced objects.
pub trait Oracle {
    /// Commit HEAD points to, `None` on an unborn branch.
    fn head(&self) -> Result<Option<CommitId>>;

    /// Whether a remote of that name is known (configured or tracked).
    fn has_remote(&self, remote: &str) -> Result<bool>;

    /// Resolve a revision, preferring the remote-tracking ref of `remote`.
    fn resolve_revision(&self, remote: &str, revision: &str) -> Result<CommitId>;

    /// All remote-tracking branches of `remote`, sorted by name.
    fn remote_branches(&self, remote: &str) -> Result<Vec<RemoteBranch>>;

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool>;

    /// Whether the commit object exists locally.
    fn contains(&self, id: &CommitId) -> bool;

    /// Walk the ancestry of `start`, children before their parents.
    fn log<'a>(&'a self, start: &CommitId) -> Result<CommitWalk<'a>>;

    fn commit_info(&self, id: &CommitId) -> Result<CommitInfo>;

    /// Flattened content of a commit's tree.
    fn snapshot(&self, id: &CommitId) -> Result<Snapshot>;

    /// Create a commit object without moving any reference.
    ///
    /// `author` defaults to the configured identity at the current time; the
    /// committer always is.
    fn create_commit(
        &self,
        parents: &[CommitId],
        content: &Snapshot,
        message: &str,
        author: Option<&Author>,
    ) -> Result<CommitId>;

    /// Whether the index differs from HEAD.
    fn has_staged_changes(&self) -> Result<bool>;

    /// Bring index and working tree from `from` to `to`, refusing to clobber
    /// local modifications.
    ///
    /// Conflicts are detected before anything is written: on error the index
    /// and working tree are unchanged.
    fn checkout(&self, from: Option<&CommitId>, to: &CommitId) -> Result<()>;

    /// Forcefully undo a [`Oracle::checkout`] from `from` to `to`.
    fn restore(&self, from: Option<&CommitId>, to: &CommitId) -> Result<()>;

    /// Point HEAD (or the branch it refers to) at `id`.
    fn set_head(&self, id: &CommitId, reflog: &str) -> Result<()>;
}
