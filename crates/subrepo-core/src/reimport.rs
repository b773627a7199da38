//! Reimport engine
//!
//! Used while rebasing a host branch whose subrepo was rebased upstream: the
//! commit HEAD imported no longer exists on the remote, but a rewritten copy
//! with the same subject does. Reimport finds that copy and amends HEAD to
//! import it instead.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::Engine;
use crate::message::{Descriptor, Operation};
use crate::oracle::{CommitId, RemoteBranch};
use crate::prefix::Prefix;
use crate::{Error, Result};

/// What made a commit a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedBy {
    Subject,
    Date,
}

impl fmt::Display for MatchedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedBy::Subject => f.write_str("subject"),
            MatchedBy::Date => f.write_str("date"),
        }
    }
}

/// A remote commit that may be the rewritten import source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchCandidate {
    pub commit: CommitId,
    pub branch: String,
    pub matched_by: MatchedBy,
    /// Author date
    pub time: DateTime<Utc>,
}

impl fmt::Display for MatchCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on '{}' (by {}, {})",
            self.commit,
            self.branch,
            self.matched_by,
            self.time.format("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}

/// Options of [`Engine::reimport`].
#[derive(Debug, Clone, Default)]
pub struct ReimportOptions {
    /// Only search this branch of the remote
    pub branch: Option<String>,
    /// Match by author date when no subject matches
    pub use_date: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReimportOutcome {
    /// HEAD was replaced by `commit`.
    Amended {
        commit: CommitId,
        /// The commit that was amended
        replaced: CommitId,
        descriptor: Descriptor,
    },
    /// HEAD already imports the only matching commit.
    UpToDate { descriptor: Descriptor },
}

/// Everything a reimport looked at, for verbose reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReimportReport {
    pub searched: Vec<String>,
    /// Every match in search order, including duplicates across branches
    pub candidates: Vec<MatchCandidate>,
    pub outcome: ReimportOutcome,
}

impl Engine<'_> {
    /// Re-point the import at HEAD to the remote commit matching the one it
    /// imported, amending HEAD in place.
    pub fn reimport(
        &self,
        remote: &str,
        prefix: &Prefix,
        options: &ReimportOptions,
    ) -> Result<ReimportReport> {
        let head = self.oracle.head()?.ok_or_else(|| Error::NotAnImport {
            detail: "the current branch has no commits yet".into(),
        })?;
        let head_info = self.oracle.commit_info(&head)?;
        let current = match self.codec.decode(&head_info.message).map_err(|e| e.in_commit(&head))? {
            None => {
                return Err(Error::NotAnImport {
                    detail: String::new(),
                });
            }
            Some(d) if d.operation == Operation::Delete => {
                return Err(Error::NotAnImport {
                    detail: format!("it deletes '{}' at '{}'", d.remote, d.prefix),
                });
            }
            Some(d) if d.remote != remote || &d.prefix != prefix => {
                return Err(Error::NotAnImport {
                    detail: format!("it imports '{}' at '{}'", d.remote, d.prefix),
                });
            }
            Some(d) => d,
        };

        self.ensure_clean_index()?;
        if !self.oracle.has_remote(remote)? {
            return Err(Error::RemoteNotFound {
                name: remote.into(),
            });
        }

        let original = self.oracle.commit_info(&current.commit)?;
        let subject = original.subject().to_string();

        let mut branches = self.oracle.remote_branches(remote)?;
        if let Some(wanted) = &options.branch {
            branches.retain(|b| &b.name == wanted);
            if branches.is_empty() {
                return Err(Error::BranchNotFound {
                    remote: remote.into(),
                    branch: wanted.clone(),
                });
            }
        }

        let date = options.use_date.then_some(original.time);
        let candidates = self.search(&branches, &subject, date)?;
        let searched = branches.into_iter().map(|b| b.name).collect();

        let mut seen = HashSet::new();
        let distinct: Vec<MatchCandidate> = candidates
            .iter()
            .filter(|c| seen.insert(c.commit.clone()))
            .cloned()
            .collect();

        if distinct.len() > 1 {
            return Err(Error::AmbiguousMatch {
                candidates: distinct,
            });
        }
        let Some(chosen) = distinct.first().map(|c| c.commit.clone()) else {
            return Err(Error::NoMatch {
                remote: remote.into(),
                subject,
            });
        };

        if chosen == current.commit {
            tracing::info!(remote, prefix = %prefix, commit = %chosen, "HEAD already imports the match");
            return Ok(ReimportReport {
                searched,
                candidates,
                outcome: ReimportOutcome::UpToDate {
                    descriptor: current,
                },
            });
        }

        let forest = self.scanner().scan(&head)?;
        let content = self.snapshot_of(Some(&head))?;
        let upstream = self.oracle.snapshot(&chosen)?;
        let amended = self.plan_import(&forest, &content, remote, prefix, &upstream)?;

        let descriptor = Descriptor::import(remote, prefix.clone(), chosen);
        let message = self
            .codec
            .encode(&descriptor, &self.codec.body(&head_info.message));
        let commit = self.materialize(
            Some(&head),
            &head_info.parents,
            &amended,
            &message,
            Some(&head_info.author),
        )?;

        Ok(ReimportReport {
            searched,
            candidates,
            outcome: ReimportOutcome::Amended {
                commit,
                replaced: head,
                descriptor,
            },
        })
    }

    /// Walk every branch looking for commits with `subject`. Commits authored
    /// at `date` are only reported when nothing matched by subject.
    fn search(
        &self,
        branches: &[RemoteBranch],
        subject: &str,
        date: Option<DateTime<Utc>>,
    ) -> Result<Vec<MatchCandidate>> {
        let mut by_subject = Vec::new();
        let mut by_date = Vec::new();

        for branch in branches {
            tracing::debug!(branch = %branch.name, tip = %branch.tip, "Searching branch");
            for id in self.oracle.log(&branch.tip)? {
                let info = self.oracle.commit_info(&id?)?;
                let matched_by = if info.subject() == subject {
                    MatchedBy::Subject
                } else if date == Some(info.time) {
                    MatchedBy::Date
                } else {
                    continue;
                };
                let candidate = MatchCandidate {
                    commit: info.id.clone(),
                    branch: branch.name.clone(),
                    matched_by,
                    time: info.time,
                };
                match matched_by {
                    MatchedBy::Subject => by_subject.push(candidate),
                    MatchedBy::Date => by_date.push(candidate),
                }
            }
        }

        Ok(if by_subject.is_empty() { by_date } else { by_subject })
    }
}
