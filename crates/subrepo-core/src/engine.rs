//! Shared machinery of the import, delete and reimport engines

use crate::cleanup::Defer;
use crate::graph::DependencyGraph;
use crate::message::{MessageCodec, TrailerCodec};
use crate::oracle::{Author, CommitId, Oracle};
use crate::scan::{Forest, Scanner, Subrepo};
use crate::snapshot::Snapshot;
use crate::{Error, Result};

/// Entry point for all subrepo operations on one repository.
///
/// The engine holds no state of its own: every call re-reads history
/// through the oracle.
#[derive(Clone, Copy)]
pub struct Engine<'a> {
    pub(crate) oracle: &'a dyn Oracle,
    pub(crate) codec: &'a dyn MessageCodec,
}

impl<'a> Engine<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self {
        Self {
            oracle,
            codec: &TrailerCodec,
        }
    }

    /// Use a different commit message encoding.
    pub fn with_codec(oracle: &'a dyn Oracle, codec: &'a dyn MessageCodec) -> Self {
        Self { oracle, codec }
    }

    pub fn oracle(&self) -> &'a dyn Oracle {
        self.oracle
    }

    pub fn scanner(&self) -> Scanner<'a> {
        Scanner::with_codec(self.oracle, self.codec)
    }

    /// Live subrepos as of HEAD.
    pub fn forest(&self) -> Result<Forest> {
        self.scanner().scan_head()
    }

    /// Dependency graph over `forest`.
    pub fn graph(&self, forest: &Forest) -> Result<DependencyGraph> {
        DependencyGraph::build(&self.scanner(), forest)
    }

    pub(crate) fn ensure_clean_index(&self) -> Result<()> {
        if self.oracle.has_staged_changes()? {
            return Err(Error::DirtyIndex);
        }
        Ok(())
    }

    /// Content of `head`, empty for an unborn branch.
    pub(crate) fn snapshot_of(&self, head: Option<&CommitId>) -> Result<Snapshot> {
        match head {
            Some(id) => self.oracle.snapshot(id),
            None => Ok(Snapshot::new()),
        }
    }

    /// Files of `head` that belong to `subrepo`, in repository paths.
    ///
    /// Below the root that is everything under the prefix. A root subrepo
    /// owns the paths of its imported commit that are still present.
    pub(crate) fn footprint(&self, subrepo: &Subrepo, head: &Snapshot) -> Result<Snapshot> {
        if !subrepo.prefix.is_root() {
            return Ok(head.subtree(&subrepo.prefix).placed_at(&subrepo.prefix));
        }
        if !self.oracle.contains(&subrepo.commit) {
            tracing::warn!(
                remote = %subrepo.remote,
                commit = %subrepo.commit,
                "Imported commit is not available locally; treating its content as unknown"
            );
            return Ok(Snapshot::new());
        }
        let imported = self.oracle.snapshot(&subrepo.commit)?;
        Ok(imported
            .paths()
            .filter_map(|path| head.get(path).map(|entry| (path.to_string(), entry.clone())))
            .collect())
    }

    /// Write `content` as a commit and make it the new HEAD.
    ///
    /// Either every step succeeds or index, working tree and HEAD are left
    /// as they were. `author` keeps the identity of a commit being amended.
    pub(crate) fn materialize(
        &self,
        head: Option<&CommitId>,
        parents: &[CommitId],
        content: &Snapshot,
        message: &str,
        author: Option<&Author>,
    ) -> Result<CommitId> {
        let commit = self.oracle.create_commit(parents, content, message, author)?;
        self.publish(head, &commit, message)?;
        Ok(commit)
    }

    /// Check out `commit`, an unreferenced object written on top of `head`,
    /// and make it the new HEAD.
    pub(crate) fn publish(
        &self,
        head: Option<&CommitId>,
        commit: &CommitId,
        message: &str,
    ) -> Result<()> {
        // A failed checkout has not touched the working tree, so there is
        // nothing to undo until it succeeds.
        self.oracle.checkout(head, commit)?;
        let mut rollback = Defer::new();
        let oracle = self.oracle;
        let checked_out = commit.clone();
        rollback.defer(move || {
            if let Err(e) = oracle.restore(head, &checked_out) {
                tracing::error!(error = %e, "Failed to restore the working tree");
            }
        });

        let subject = message.lines().next().unwrap_or_default();
        self.oracle.set_head(commit, &format!("subrepo: {subject}"))?;
        rollback.release();

        tracing::info!(commit = %commit, subject, "Created subrepo commit");
        Ok(())
    }
}
