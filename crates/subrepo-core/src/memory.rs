//! In-memory oracle
//!
//! A self-contained object store with remote-tracking branches and a single
//! HEAD. It mirrors what the engines observe of a real repository whose
//! remotes were all fetched into one object database, which makes it suitable
//! for unit tests and benchmarks.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

use crate::oracle::{Author, CommitId, CommitInfo, CommitWalk, Oracle, RemoteBranch};
use crate::snapshot::{FileEntry, MODE_FILE, Snapshot};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredCommit {
    parents: Vec<CommitId>,
    message: String,
    time: i64,
    /// Identity other than the default one
    author: Option<Author>,
    content: Snapshot,
}

const DEFAULT_NAME: &str = "Memory User";
const DEFAULT_EMAIL: &str = "memory@localhost";

/// Oracle keeping every object in memory.
#[derive(Debug, Default)]
pub struct MemoryOracle {
    commits: RefCell<HashMap<CommitId, StoredCommit>>,
    remotes: RefCell<BTreeMap<String, BTreeMap<String, CommitId>>>,
    head: RefCell<Option<CommitId>>,
    worktree: RefCell<Snapshot>,
    staged: Cell<bool>,
    clock: Cell<i64>,
    fail_set_head: Cell<bool>,
}

impl MemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object entry for a file with the given content.
    pub fn blob(content: &str) -> FileEntry {
        FileEntry::new(hex(Sha256::digest(content.as_bytes()).as_slice()), MODE_FILE)
    }

    /// Build a snapshot from `(path, content)` pairs.
    pub fn files(files: &[(&str, &str)]) -> Snapshot {
        files
            .iter()
            .map(|(path, content)| (path.to_string(), Self::blob(content)))
            .collect()
    }

    /// Store a commit with its own timestamp, one tick after the previous one.
    pub fn commit(&self, parents: &[CommitId], content: Snapshot, message: &str) -> CommitId {
        let time = self.clock.get() + 1;
        self.commit_at(parents, content, message, time)
    }

    /// Store a commit with an explicit author timestamp.
    pub fn commit_at(
        &self,
        parents: &[CommitId],
        content: Snapshot,
        message: &str,
        time: i64,
    ) -> CommitId {
        self.store(parents, content, message, time, None)
    }

    fn store(
        &self,
        parents: &[CommitId],
        content: Snapshot,
        message: &str,
        time: i64,
        author: Option<Author>,
    ) -> CommitId {
        self.clock.set(self.clock.get().max(time));

        let mut hasher = Sha256::new();
        for parent in parents {
            hasher.update(parent.as_str().as_bytes());
        }
        for (path, entry) in &content {
            hasher.update(path.as_bytes());
            hasher.update(entry.id.as_bytes());
            hasher.update(entry.mode.to_be_bytes());
        }
        hasher.update(message.as_bytes());
        hasher.update(time.to_be_bytes());
        if let Some(author) = &author {
            hasher.update(author.to_string().as_bytes());
        }
        let id = CommitId::new(hex(&hasher.finalize()[..20]));

        self.commits.borrow_mut().insert(
            id.clone(),
            StoredCommit {
                parents: parents.to_vec(),
                message: message.to_string(),
                time,
                author,
                content,
            },
        );
        id
    }

    /// Create or move the remote-tracking branch `remote/branch`.
    pub fn set_branch(&self, remote: &str, branch: &str, tip: &CommitId) {
        self.remotes
            .borrow_mut()
            .entry(remote.to_string())
            .or_default()
            .insert(branch.to_string(), tip.clone());
    }

    /// Point HEAD at `id` and check it out, as a plain `git reset --hard`.
    pub fn reset_head(&self, id: &CommitId) {
        let content = self
            .commits
            .borrow()
            .get(id)
            .map(|c| c.content.clone())
            .unwrap_or_default();
        *self.worktree.borrow_mut() = content;
        *self.head.borrow_mut() = Some(id.clone());
    }

    /// Simulate `git add` of local modifications.
    pub fn set_staged(&self, staged: bool) {
        self.staged.set(staged);
    }

    /// Make the next [`Oracle::set_head`] call fail.
    pub fn fail_next_set_head(&self) {
        self.fail_set_head.set(true);
    }

    /// Content currently checked out.
    pub fn worktree(&self) -> Snapshot {
        self.worktree.borrow().clone()
    }

    /// Number of commits reachable from HEAD.
    pub fn history_len(&self) -> usize {
        match self.head.borrow().clone() {
            Some(head) => self.log(&head).map(|walk| walk.count()).unwrap_or(0),
            None => 0,
        }
    }

    fn stored(&self, id: &CommitId) -> Result<StoredCommit> {
        self.commits
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::CommitUnavailable { commit: id.clone() })
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl Oracle for MemoryOracle {
    fn head(&self) -> Result<Option<CommitId>> {
        Ok(self.head.borrow().clone())
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        Ok(self.remotes.borrow().contains_key(remote))
    }

    fn resolve_revision(&self, remote: &str, revision: &str) -> Result<CommitId> {
        if let Some(tip) = self
            .remotes
            .borrow()
            .get(remote)
            .and_then(|branches| branches.get(revision))
        {
            return Ok(tip.clone());
        }

        let commits = self.commits.borrow();
        let mut matches = commits
            .keys()
            .filter(|id| revision.len() >= 4 && id.as_str().starts_with(revision));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id.clone()),
            _ => Err(Error::RevisionNotFound {
                remote: remote.into(),
                revision: revision.into(),
            }),
        }
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<RemoteBranch>> {
        Ok(self
            .remotes
            .borrow()
            .get(remote)
            .map(|branches| {
                branches
                    .iter()
                    .map(|(name, tip)| RemoteBranch {
                        name: name.clone(),
                        tip: tip.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool> {
        for id in self.log(descendant)? {
            if id? == *ancestor {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn contains(&self, id: &CommitId) -> bool {
        self.commits.borrow().contains_key(id)
    }

    fn log<'a>(&'a self, start: &CommitId) -> Result<CommitWalk<'a>> {
        // Timestamps strictly increase from parent to child, so popping the
        // newest pending commit first yields a topological order.
        let mut pending = BinaryHeap::new();
        let mut seen = HashSet::new();
        let mut order = Vec::new();

        let first = self.stored(start)?;
        pending.push((first.time, start.clone()));
        seen.insert(start.clone());

        while let Some((_, id)) = pending.pop() {
            let commit = self.stored(&id)?;
            for parent in &commit.parents {
                if seen.insert(parent.clone()) {
                    let stored = self.stored(parent)?;
                    pending.push((stored.time, parent.clone()));
                }
            }
            order.push(Ok(id));
        }

        Ok(Box::new(order.into_iter()))
    }

    fn commit_info(&self, id: &CommitId) -> Result<CommitInfo> {
        let stored = self.stored(id)?;
        let time: DateTime<Utc> = Utc.timestamp_opt(stored.time, 0).single().unwrap_or_default();
        let author = stored.author.unwrap_or_else(|| Author {
            name: DEFAULT_NAME.into(),
            email: DEFAULT_EMAIL.into(),
            when: time.fixed_offset(),
        });
        Ok(CommitInfo {
            id: id.clone(),
            message: stored.message,
            time,
            author,
            parents: stored.parents,
        })
    }

    fn snapshot(&self, id: &CommitId) -> Result<Snapshot> {
        Ok(self.stored(id)?.content)
    }

    fn create_commit(
        &self,
        parents: &[CommitId],
        content: &Snapshot,
        message: &str,
        author: Option<&Author>,
    ) -> Result<CommitId> {
        for parent in parents {
            self.stored(parent)?;
        }
        Ok(match author {
            Some(author) => self.store(
                parents,
                content.clone(),
                message,
                author.when.timestamp(),
                Some(author.clone()),
            ),
            None => self.commit(parents, content.clone(), message),
        })
    }

    fn has_staged_changes(&self) -> Result<bool> {
        Ok(self.staged.get())
    }

    fn checkout(&self, _from: Option<&CommitId>, to: &CommitId) -> Result<()> {
        let content = self.stored(to)?.content;
        *self.worktree.borrow_mut() = content;
        Ok(())
    }

    fn restore(&self, from: Option<&CommitId>, _to: &CommitId) -> Result<()> {
        let content = match from {
            Some(id) => self.stored(id)?.content,
            None => Snapshot::new(),
        };
        *self.worktree.borrow_mut() = content;
        Ok(())
    }

    fn set_head(&self, id: &CommitId, _reflog: &str) -> Result<()> {
        if self.fail_set_head.replace(false) {
            return Err(Error::oracle("set_head", "reference is locked"));
        }
        self.stored(id)?;
        *self.head.borrow_mut() = Some(id.clone());
        Ok(())
    }
}
