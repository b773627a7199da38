//! Delete engine
//!
//! Removes one explicit subrepo together with every implicit dependency no
//! other subrepo still needs, as a single commit. Implicit dependencies
//! include root subrepos absorbed by the deleted root import.

use std::collections::BTreeSet;

use crate::engine::Engine;
use crate::graph::SubrepoKey;
use crate::message::{Descriptor, MessageEditor, Verbatim, finalize};
use crate::oracle::CommitId;
use crate::prefix::Prefix;
use crate::{Error, Result};

/// Options of [`Engine::delete`].
#[derive(Clone, Copy)]
pub struct DeleteOptions<'e> {
    pub editor: &'e dyn MessageEditor,
}

impl Default for DeleteOptions<'_> {
    fn default() -> Self {
        Self { editor: &Verbatim }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub commit: CommitId,
    pub descriptor: Descriptor,
    /// Implicit dependencies removed along with the subrepo
    pub removed: Vec<SubrepoKey>,
    /// Dependencies left in place because other subrepos need them
    pub retained: Vec<SubrepoKey>,
}

impl Engine<'_> {
    /// Delete the subrepo imported from `remote` at `prefix`.
    pub fn delete(
        &self,
        remote: &str,
        prefix: &Prefix,
        options: &DeleteOptions<'_>,
    ) -> Result<DeleteOutcome> {
        let not_found = || Error::SubrepoNotFound {
            remote: remote.into(),
            prefix: prefix.to_string(),
        };

        let Some(head) = self.oracle.head()? else {
            return Err(not_found());
        };
        let forest = self.scanner().scan(&head)?;
        let target = match forest.get(prefix, remote) {
            Some(subrepo) if subrepo.remote == remote => subrepo.clone(),
            Some(subrepo) => {
                return Err(Error::SubrepoMismatch {
                    remote: remote.into(),
                    prefix: prefix.to_string(),
                    found: subrepo.remote.clone(),
                });
            }
            None => {
                // Absorbed root subrepos go away with the import containing them
                if prefix.is_root()
                    && let Some(absorbed) = forest.absorbed_root(remote)
                    && forest.get(prefix, &absorbed.by).is_some()
                {
                    return Err(Error::StillReferenced {
                        subrepo: SubrepoKey::new(prefix.clone(), remote),
                        importers: vec![SubrepoKey::new(Prefix::root(), absorbed.by.clone())],
                    });
                }
                return Err(not_found());
            }
        };
        self.ensure_clean_index()?;

        let key = SubrepoKey::new(prefix.clone(), remote);
        let graph = self.graph(&forest)?;
        let importers = graph.dependents_of(&key);
        if !importers.is_empty() {
            return Err(Error::StillReferenced {
                subrepo: key,
                importers,
            });
        }
        let plan = graph.removal_plan(&key);

        let current = self.snapshot_of(Some(&head))?;
        let mut kept = BTreeSet::new();
        for other in forest.iter().filter(|s| s.slot() != target.slot()) {
            kept.extend(self.footprint(other, &current)?.paths().map(str::to_string));
        }

        let mut content = current.clone();
        for path in self.footprint(&target, &current)?.paths() {
            if !kept.contains(path) {
                content.remove(path);
            }
        }
        tracing::debug!(
            removed_files = current.len() - content.len(),
            cascaded = plan.removed.len(),
            "Planned delete"
        );

        let descriptor = Descriptor::delete(remote, prefix.clone(), target.commit.clone());
        let body = delete_body(&plan.removed, &plan.retained);
        let message = finalize(self.codec, &descriptor, &body, options.editor)?;
        let commit = self.materialize(Some(&head), &[head.clone()], &content, &message, None)?;

        Ok(DeleteOutcome {
            commit,
            descriptor,
            removed: plan.removed,
            retained: plan.retained,
        })
    }
}

fn delete_body(removed: &[SubrepoKey], retained: &[SubrepoKey]) -> String {
    let mut lines = Vec::new();
    for key in removed {
        lines.push(format!("Removes implicit dependency '{}' at '{}'", key.remote, key.prefix));
    }
    for key in retained {
        lines.push(format!(
            "Keeps dependency '{}' at '{}' needed by other subrepos",
            key.remote, key.prefix
        ));
    }
    lines.join("\n")
}
