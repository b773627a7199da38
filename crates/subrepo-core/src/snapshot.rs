//! Flattened tree snapshots
//!
//! A [`Snapshot`] maps every file path of a tree to the object stored there.
//! Import, delete and dependency discovery are expressed as pure functions
//! over snapshots so they can be reasoned about (and tested) without a
//! working tree.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::prefix::Prefix;

/// Regular, non-executable file
pub const MODE_FILE: u32 = 0o100644;
pub const MODE_EXECUTABLE: u32 = 0o100755;
pub const MODE_SYMLINK: u32 = 0o120000;
/// Gitlink (a submodule commit recorded in a tree)
pub const MODE_GITLINK: u32 = 0o160000;

/// Object stored at one path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    /// Hexadecimal object id
    pub id: String,
    pub mode: u32,
}

impl FileEntry {
    pub fn new(id: impl Into<String>, mode: u32) -> Self {
        Self {
            id: id.into(),
            mode,
        }
    }
}

/// Path-sorted flat view of a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<String, FileEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: FileEntry) -> Option<FileEntry> {
        self.files.insert(path.into(), entry)
    }

    pub fn remove(&mut self, path: &str) -> Option<FileEntry> {
        self.files.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FileEntry> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Content below `prefix`, with paths made relative to it.
    pub fn subtree(&self, prefix: &Prefix) -> Snapshot {
        if prefix.is_root() {
            return self.clone();
        }
        self.files
            .iter()
            .filter_map(|(path, entry)| {
                prefix
                    .strip(path)
                    .map(|rel| (rel.to_string(), entry.clone()))
            })
            .collect()
    }

    /// This snapshot's content relocated below `prefix`.
    pub fn placed_at(&self, prefix: &Prefix) -> Snapshot {
        if prefix.is_root() {
            return self.clone();
        }
        self.files
            .iter()
            .map(|(path, entry)| (prefix.host_path(path), entry.clone()))
            .collect()
    }
}

impl FromIterator<(String, FileEntry)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, FileEntry)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a FileEntry);
    type IntoIter = btree_map::Iter<'a, String, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Difference at a single path between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: String,
    pub old: Option<FileEntry>,
    pub new: Option<FileEntry>,
}

/// Compute the per-path changes turning `old` into `new`, sorted by path.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for (path, entry) in old {
        match new.get(path) {
            Some(other) if other == entry => {}
            other => changes.push(Change {
                path: path.clone(),
                old: Some(entry.clone()),
                new: other.cloned(),
            }),
        }
    }
    for (path, entry) in new {
        if !old.contains(path) {
            changes.push(Change {
                path: path.clone(),
                old: None,
                new: Some(entry.clone()),
            });
        }
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// How much of one snapshot survives verbatim inside another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Every file is present with identical content
    Full,
    /// Some files are present, possibly modified
    Partial,
    /// None of the paths exist anymore
    Absent,
}

/// Classify how `inner` (already placed at its final location) is contained
/// in `outer`. An empty `inner` counts as [`Presence::Absent`].
pub fn presence(inner: &Snapshot, outer: &Snapshot) -> Presence {
    let mut identical = 0usize;
    let mut existing = 0usize;

    for (path, entry) in inner {
        if let Some(other) = outer.get(path) {
            existing += 1;
            if other == entry {
                identical += 1;
            }
        }
    }

    if existing == 0 {
        Presence::Absent
    } else if identical == inner.len() {
        Presence::Full
    } else {
        Presence::Partial
    }
}
