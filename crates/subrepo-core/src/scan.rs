//! History scanner
//!
//! Reconstructs the set of live subrepos purely from commit messages. History
//! is walked newest to oldest and the first event seen for a slot wins, which
//! is the same as replaying it oldest to newest with later events overriding
//! earlier ones.
//!
//! A root import whose content contains everything an older root import
//! brought in absorbs it: the older subrepo stops being explicit and lives on
//! as a dependency of the newer one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::message::{Descriptor, MessageCodec, Operation, TrailerCodec};
use crate::oracle::{CommitId, Oracle};
use crate::prefix::Prefix;
use crate::snapshot::{Presence, Snapshot, presence};
use crate::Result;

/// Where a subrepo lives, as far as replacing it is concerned.
///
/// An import below the root replaces whatever was imported at the same
/// prefix. Root imports only ever replace an earlier import of the same
/// remote, so several remotes can share the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum Slot {
    Root(String),
    Path(Prefix),
}

impl Slot {
    pub fn of(prefix: &Prefix, remote: &str) -> Self {
        if prefix.is_root() {
            Slot::Root(remote.to_string())
        } else {
            Slot::Path(prefix.clone())
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Root(remote) => write!(f, "'{remote}' at '.'"),
            Slot::Path(prefix) => write!(f, "'{prefix}'"),
        }
    }
}

/// A live subrepo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subrepo {
    pub remote: String,
    pub prefix: Prefix,
    /// Upstream commit the content was imported from
    pub commit: CommitId,
    /// Commit of the scanned history that performed the import
    pub imported_by: CommitId,
}

impl Subrepo {
    pub fn slot(&self) -> Slot {
        Slot::of(&self.prefix, &self.remote)
    }
}

/// A root subrepo whose whole content a newer root import brought along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Absorbed {
    pub subrepo: Subrepo,
    /// Remote of the root import containing it
    pub by: String,
}

/// Live subrepos keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    entries: BTreeMap<Slot, Subrepo>,
    absorbed: BTreeMap<Slot, Absorbed>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// The subrepo occupying the slot `prefix`/`remote` would use.
    pub fn get(&self, prefix: &Prefix, remote: &str) -> Option<&Subrepo> {
        self.entries.get(&Slot::of(prefix, remote))
    }

    /// All subrepos imported exactly at `prefix`.
    pub fn at(&self, prefix: &Prefix) -> Vec<&Subrepo> {
        self.entries
            .values()
            .filter(|s| &s.prefix == prefix)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subrepos sorted by prefix, then remote.
    pub fn iter(&self) -> impl Iterator<Item = &Subrepo> {
        let mut all: Vec<&Subrepo> = self.entries.values().collect();
        all.sort_by(|a, b| (&a.prefix, &a.remote).cmp(&(&b.prefix, &b.remote)));
        all.into_iter()
    }

    /// Root subrepos absorbed by a newer root import, sorted by remote.
    pub fn absorbed(&self) -> impl Iterator<Item = &Absorbed> {
        self.absorbed.values()
    }

    /// The absorbed subrepo of `remote` at the root, if any.
    pub fn absorbed_root(&self, remote: &str) -> Option<&Absorbed> {
        self.absorbed.get(&Slot::Root(remote.to_string()))
    }

    fn insert(&mut self, subrepo: Subrepo) {
        self.entries.insert(subrepo.slot(), subrepo);
    }

    fn absorb(&mut self, subrepo: Subrepo, by: String) {
        self.absorbed.insert(subrepo.slot(), Absorbed { subrepo, by });
    }
}

/// One decoded subrepo commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub commit: CommitId,
    pub descriptor: Descriptor,
}

/// Decodes history into subrepo events and forests.
pub struct Scanner<'a> {
    oracle: &'a dyn Oracle,
    codec: &'a dyn MessageCodec,
}

impl<'a> Scanner<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self {
        Self {
            oracle,
            codec: &TrailerCodec,
        }
    }

    pub fn with_codec(oracle: &'a dyn Oracle, codec: &'a dyn MessageCodec) -> Self {
        Self { oracle, codec }
    }

    pub fn oracle(&self) -> &'a dyn Oracle {
        self.oracle
    }

    pub fn codec(&self) -> &'a dyn MessageCodec {
        self.codec
    }

    /// Decode a single commit.
    pub fn decode(&self, id: &CommitId) -> Result<Option<Descriptor>> {
        let info = self.oracle.commit_info(id)?;
        self.codec.decode(&info.message).map_err(|e| e.in_commit(id))
    }

    /// Subrepo events reachable from `start`, newest first.
    pub fn events(&self, start: &CommitId) -> Result<impl Iterator<Item = Result<Event>> + '_> {
        let walk = self.oracle.log(start)?;
        Ok(walk.filter_map(move |id| {
            let id = match id {
                Ok(id) => id,
                Err(e) => return Some(Err(e)),
            };
            match self.decode(&id) {
                Ok(Some(descriptor)) => Some(Ok(Event {
                    commit: id,
                    descriptor,
                })),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        }))
    }

    /// Live subrepos as of `start`.
    pub fn scan(&self, start: &CommitId) -> Result<Forest> {
        let mut resolved = HashSet::new();
        let mut forest = Forest::new();
        let mut newer_roots = Vec::new();
        let mut snapshots = SnapshotCache::new(self.oracle);

        for event in self.events(start)? {
            let Event { commit, descriptor } = event?;
            let slot = Slot::of(&descriptor.prefix, &descriptor.remote);
            let first = resolved.insert(slot);
            if descriptor.operation != Operation::Import {
                continue;
            }
            let subrepo = Subrepo {
                remote: descriptor.remote,
                prefix: descriptor.prefix,
                commit: descriptor.commit,
                imported_by: commit,
            };
            if subrepo.prefix.is_root() {
                newer_roots.push(subrepo.clone());
            }
            if !first {
                continue;
            }
            match absorber(&subrepo, &newer_roots, &mut snapshots)? {
                Some(by) => {
                    tracing::debug!(remote = %subrepo.remote, by = %by, "Root subrepo absorbed");
                    forest.absorb(subrepo, by);
                }
                None => forest.insert(subrepo),
            }
        }

        tracing::debug!(start = %start, live = forest.len(), "Scanned history");
        Ok(forest)
    }

    /// Live subrepos as of HEAD; empty for an unborn branch.
    pub fn scan_head(&self) -> Result<Forest> {
        match self.oracle.head()? {
            Some(head) => self.scan(&head),
            None => Ok(Forest::new()),
        }
    }

    /// State of one slot as of `start`, stopping at the first event for it.
    ///
    /// An absorbed root subrepo is not live, so it is reported as `None`.
    pub fn lookup(&self, start: &CommitId, slot: &Slot) -> Result<Option<Subrepo>> {
        let mut newer_roots = Vec::new();
        let mut snapshots = SnapshotCache::new(self.oracle);

        for event in self.events(start)? {
            let Event { commit, descriptor } = event?;
            let matches = Slot::of(&descriptor.prefix, &descriptor.remote) == *slot;
            if descriptor.operation == Operation::Delete {
                if matches {
                    return Ok(None);
                }
                continue;
            }
            let subrepo = Subrepo {
                remote: descriptor.remote,
                prefix: descriptor.prefix,
                commit: descriptor.commit,
                imported_by: commit,
            };
            if matches {
                return Ok(match absorber(&subrepo, &newer_roots, &mut snapshots)? {
                    Some(_) => None,
                    None => Some(subrepo),
                });
            }
            if subrepo.prefix.is_root() {
                newer_roots.push(subrepo);
            }
        }
        Ok(None)
    }
}

/// Remote of the first newer root import whose content strictly contains
/// everything `subrepo` imported. Only root subrepos can be absorbed, and
/// only when both imported commits are available.
fn absorber(
    subrepo: &Subrepo,
    newer_roots: &[Subrepo],
    snapshots: &mut SnapshotCache<'_>,
) -> Result<Option<String>> {
    if !subrepo.prefix.is_root() || !snapshots.available(&subrepo.commit) {
        return Ok(None);
    }
    let inner = snapshots.get(&subrepo.commit)?.clone();
    if inner.is_empty() {
        return Ok(None);
    }
    for outer in newer_roots {
        if outer.remote == subrepo.remote || !snapshots.available(&outer.commit) {
            continue;
        }
        let content = snapshots.get(&outer.commit)?;
        if inner.len() < content.len() && presence(&inner, content) == Presence::Full {
            return Ok(Some(outer.remote.clone()));
        }
    }
    Ok(None)
}

/// Snapshots read at most once per scan or graph build.
pub(crate) struct SnapshotCache<'a> {
    oracle: &'a dyn Oracle,
    cache: HashMap<CommitId, Snapshot>,
}

impl<'a> SnapshotCache<'a> {
    pub(crate) fn new(oracle: &'a dyn Oracle) -> Self {
        Self {
            oracle,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn available(&self, id: &CommitId) -> bool {
        self.cache.contains_key(id) || self.oracle.contains(id)
    }

    pub(crate) fn get(&mut self, id: &CommitId) -> Result<&Snapshot> {
        if !self.cache.contains_key(id) {
            let snapshot = self.oracle.snapshot(id)?;
            self.cache.insert(id.clone(), snapshot);
        }
        Ok(&self.cache[id])
    }
}
