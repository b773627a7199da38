//! Import engine
//!
//! An import replaces the content a subrepo owns with the content of an
//! upstream commit and records the result as a single, non-merge commit on
//! top of HEAD. Adding a new subrepo and updating an existing one are the
//! same operation: the old content is simply empty for an addition.

use std::collections::BTreeMap;

use crate::engine::Engine;
use crate::graph::SubrepoKey;
use crate::message::{Descriptor, MessageEditor, Verbatim, finalize, validate_remote};
use crate::oracle::CommitId;
use crate::prefix::Prefix;
use crate::scan::{Forest, Slot};
use crate::snapshot::{Snapshot, diff};
use crate::{Error, Result};

/// Options of [`Engine::import`].
#[derive(Clone, Copy)]
pub struct ImportOptions<'e> {
    /// Import even if no branch of the remote contains the revision
    pub force: bool,
    pub editor: &'e dyn MessageEditor,
}

impl Default for ImportOptions<'_> {
    fn default() -> Self {
        Self {
            force: false,
            editor: &Verbatim,
        }
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Committed {
        commit: CommitId,
        descriptor: Descriptor,
        /// Implicit dependencies the imported content brought along, sorted
        dependencies: Vec<SubrepoKey>,
    },
    /// The prefix already holds exactly this revision; nothing was written.
    UpToDate { descriptor: Descriptor },
}

impl ImportOutcome {
    pub fn descriptor(&self) -> &Descriptor {
        match self {
            ImportOutcome::Committed { descriptor, .. } => descriptor,
            ImportOutcome::UpToDate { descriptor } => descriptor,
        }
    }
}

impl Engine<'_> {
    /// Import `revision` of `remote` at `prefix`.
    pub fn import(
        &self,
        remote: &str,
        prefix: &Prefix,
        revision: &str,
        options: &ImportOptions<'_>,
    ) -> Result<ImportOutcome> {
        validate_remote(remote)?;
        if !self.oracle.has_remote(remote)? {
            return Err(Error::RemoteNotFound {
                name: remote.into(),
            });
        }

        let commit = self.oracle.resolve_revision(remote, revision)?;
        self.verify_in_remote(remote, &commit, options.force)?;
        self.ensure_clean_index()?;

        let head = self.oracle.head()?;
        let forest = match &head {
            Some(id) => self.scanner().scan(id)?,
            None => Forest::new(),
        };
        let current = self.snapshot_of(head.as_ref())?;
        let upstream = self.oracle.snapshot(&commit)?;

        let content = self.plan_import(&forest, &current, remote, prefix, &upstream)?;
        let descriptor = Descriptor::import(remote, prefix.clone(), commit.clone());

        let recorded = forest
            .get(prefix, remote)
            .is_some_and(|s| s.remote == remote && s.commit == commit);
        if recorded && content == current {
            tracing::info!(remote, prefix = %prefix, commit = %commit, "Subrepo is up to date");
            return Ok(ImportOutcome::UpToDate { descriptor });
        }

        let message = finalize(self.codec, &descriptor, "", options.editor)?;
        let parents: Vec<CommitId> = head.iter().cloned().collect();
        let created = self.oracle.create_commit(&parents, &content, &message, None)?;

        // Nested history is read before HEAD moves, so a failure here leaves
        // only an unreferenced object behind.
        let dependencies = {
            let forest = self.scanner().scan(&created)?;
            let graph = self.graph(&forest)?;
            let key = SubrepoKey::new(prefix.clone(), remote);
            graph.closure(&key).into_iter().collect()
        };
        self.publish(head.as_ref(), &created, &message)?;

        Ok(ImportOutcome::Committed {
            commit: created,
            descriptor,
            dependencies,
        })
    }

    fn verify_in_remote(&self, remote: &str, commit: &CommitId, force: bool) -> Result<()> {
        for branch in self.oracle.remote_branches(remote)? {
            if self.oracle.is_ancestor(commit, &branch.tip)? {
                tracing::debug!(remote, branch = %branch.name, commit = %commit, "Found in remote");
                return Ok(());
            }
        }
        if force {
            tracing::warn!(remote, commit = %commit, "Commit is on no branch of the remote; forced");
            return Ok(());
        }
        Err(Error::CommitNotInRemote {
            remote: remote.into(),
            commit: commit.clone(),
        })
    }

    /// Compute the host content after importing `upstream` at `prefix`.
    ///
    /// The subrepo's old content is replaced as a whole. Files owned by other
    /// live subrepos are never deleted, and changing them is an overlap
    /// unless the new content is identical.
    pub(crate) fn plan_import(
        &self,
        forest: &Forest,
        current: &Snapshot,
        remote: &str,
        prefix: &Prefix,
        upstream: &Snapshot,
    ) -> Result<Snapshot> {
        let slot = Slot::of(prefix, remote);
        let mut conflicts: Vec<SubrepoKey> = Vec::new();
        let mut owners: BTreeMap<String, Vec<SubrepoKey>> = BTreeMap::new();

        for other in forest.iter().filter(|s| s.slot() != slot) {
            let key = SubrepoKey::new(other.prefix.clone(), other.remote.clone());
            if !prefix.is_root() && !other.prefix.is_root() && prefix.overlaps(&other.prefix) {
                conflicts.push(key.clone());
            }
            for (path, _) in &self.footprint(other, current)? {
                owners.entry(path.clone()).or_default().push(key.clone());
            }
        }

        let old = if prefix.is_root() {
            match forest.get(prefix, remote) {
                Some(previous) if self.oracle.contains(&previous.commit) => {
                    self.oracle.snapshot(&previous.commit)?
                }
                Some(previous) => {
                    tracing::warn!(
                        remote,
                        commit = %previous.commit,
                        "Previously imported commit is not available; stale files will not be removed"
                    );
                    Snapshot::new()
                }
                None => Snapshot::new(),
            }
        } else {
            current.subtree(prefix)
        };

        let mut content = current.clone();
        for change in diff(&old, upstream) {
            let path = prefix.host_path(&change.path);
            let owned_by = owners.get(&path);
            match change.new {
                Some(entry) => {
                    if let Some(keys) = owned_by
                        && current.get(&path) != Some(&entry)
                    {
                        conflicts.extend(keys.iter().cloned());
                        continue;
                    }
                    content.insert(path, entry);
                }
                None => {
                    if let Some(keys) = owned_by {
                        tracing::debug!(path, owners = keys.len(), "Keeping shared file");
                        continue;
                    }
                    content.remove(&path);
                }
            }
        }

        if !conflicts.is_empty() {
            conflicts.sort();
            conflicts.dedup();
            return Err(Error::Overlap {
                prefix: prefix.to_string(),
                conflicts,
            });
        }
        Ok(content)
    }
}
