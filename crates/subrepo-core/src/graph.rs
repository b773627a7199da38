//! Dependency graph between subrepos
//!
//! Explicit subrepos come from the host's own history. Every subrepo whose
//! imported commit is available locally is scanned in turn: the subrepos its
//! upstream history imported become implicit dependencies, placed below the
//! importer's prefix. Root subrepos absorbed by a newer root import are
//! implicit dependencies of it. The graph is rebuilt for every command and
//! never stored.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::oracle::CommitId;
use crate::prefix::Prefix;
use crate::scan::{Forest, Scanner, Slot, SnapshotCache};
use crate::snapshot::{Presence, presence};
use crate::Result;

/// Identity of a subrepo inside the host repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SubrepoKey {
    pub prefix: Prefix,
    pub remote: String,
}

impl SubrepoKey {
    pub fn new(prefix: Prefix, remote: impl Into<String>) -> Self {
        Self {
            prefix,
            remote: remote.into(),
        }
    }

    pub fn slot(&self) -> Slot {
        Slot::of(&self.prefix, &self.remote)
    }
}

impl fmt::Display for SubrepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' at '{}'", self.remote, self.prefix)
    }
}

/// How an edge was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Discovery {
    /// The importer's upstream history imported the dependency
    History,
    /// The dependency's whole content is part of the importer's content
    Content,
}

/// `importer` needs `dependency` to stay in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub importer: SubrepoKey,
    pub dependency: SubrepoKey,
    pub discovery: Discovery,
}

/// A subrepo known to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub key: SubrepoKey,
    pub commit: CommitId,
    /// Imported by the user rather than pulled in by another subrepo
    pub explicit: bool,
    /// Whether `commit` exists in the local object database
    pub available: bool,
}

/// What deleting one subrepo takes with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalPlan {
    /// Implicit dependencies no remaining importer needs, sorted
    pub removed: Vec<SubrepoKey>,
    /// Dependencies kept because another importer still needs them, sorted
    pub retained: Vec<SubrepoKey>,
}

/// Reference graph over explicit and implicit subrepos.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<SubrepoKey, Node>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Build the graph for the live subrepos of `forest`.
    pub fn build(scanner: &Scanner<'_>, forest: &Forest) -> Result<Self> {
        let oracle = scanner.oracle();
        let mut graph = Self::default();
        let mut snapshots = SnapshotCache::new(oracle);
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        for subrepo in forest.iter() {
            let key = SubrepoKey::new(subrepo.prefix.clone(), subrepo.remote.clone());
            let available = oracle.contains(&subrepo.commit);
            if !available {
                tracing::warn!(
                    subrepo = %key,
                    commit = %subrepo.commit,
                    "Imported commit is not available locally; its dependencies are unknown"
                );
            }
            graph.nodes.insert(
                key.clone(),
                Node {
                    key: key.clone(),
                    commit: subrepo.commit.clone(),
                    explicit: true,
                    available,
                },
            );
            queue.push_back(key);
        }
        graph.expand(scanner, &mut snapshots, &mut queue, &mut visited)?;

        // Absorbed root subrepos hang off the live root import containing them.
        for absorbed in forest.absorbed() {
            let importer = SubrepoKey::new(Prefix::root(), absorbed.by.clone());
            if !graph.nodes.get(&importer).is_some_and(|n| n.explicit) {
                continue;
            }
            let key = SubrepoKey::new(Prefix::root(), absorbed.subrepo.remote.clone());
            graph.add_edge(&importer, &key, Discovery::Content);
            if !graph.nodes.contains_key(&key) {
                graph.nodes.insert(
                    key.clone(),
                    Node {
                        key: key.clone(),
                        commit: absorbed.subrepo.commit.clone(),
                        explicit: false,
                        available: oracle.contains(&absorbed.subrepo.commit),
                    },
                );
                queue.push_back(key);
            }
        }
        graph.expand(scanner, &mut snapshots, &mut queue, &mut visited)?;

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Built dependency graph"
        );
        Ok(graph)
    }

    /// Breadth-first walk over the upstream histories of queued subrepos.
    fn expand(
        &mut self,
        scanner: &Scanner<'_>,
        snapshots: &mut SnapshotCache<'_>,
        queue: &mut VecDeque<SubrepoKey>,
        visited: &mut BTreeSet<SubrepoKey>,
    ) -> Result<()> {
        let oracle = scanner.oracle();
        while let Some(key) = queue.pop_front() {
            if !visited.insert(key.clone()) {
                continue;
            }
            let Some(node) = self.nodes.get(&key).cloned() else {
                continue;
            };
            if !node.available {
                continue;
            }

            let nested = scanner.scan(&node.commit)?;
            for inner in nested.iter() {
                if oracle.contains(&inner.commit) {
                    let placed = snapshots.get(&inner.commit)?.placed_at(&inner.prefix);
                    let outer = snapshots.get(&node.commit)?;
                    if presence(&placed, outer) == Presence::Absent {
                        tracing::warn!(
                            importer = %key,
                            remote = %inner.remote,
                            prefix = %inner.prefix,
                            "Nested subrepo no longer has content upstream; ignoring it"
                        );
                        continue;
                    }
                }

                let location = key.prefix.join(&inner.prefix);
                let dependency = SubrepoKey::new(location, inner.remote.clone());
                if dependency == key {
                    continue;
                }
                self.add_edge(&key, &dependency, Discovery::History);

                if !self.nodes.contains_key(&dependency) {
                    self.nodes.insert(
                        dependency.clone(),
                        Node {
                            key: dependency.clone(),
                            commit: inner.commit.clone(),
                            explicit: false,
                            available: oracle.contains(&inner.commit),
                        },
                    );
                }
                queue.push_back(dependency);
            }
        }
        Ok(())
    }

    fn add_edge(&mut self, importer: &SubrepoKey, dependency: &SubrepoKey, discovery: Discovery) {
        let exists = self
            .edges
            .iter()
            .any(|e| &e.importer == importer && &e.dependency == dependency);
        if !exists {
            self.edges.push(DependencyEdge {
                importer: importer.clone(),
                dependency: dependency.clone(),
                discovery,
            });
        }
    }

    pub fn node(&self, key: &SubrepoKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Subrepos that directly need `dependency`, sorted.
    pub fn dependents_of(&self, dependency: &SubrepoKey) -> Vec<SubrepoKey> {
        let found: BTreeSet<SubrepoKey> = self
            .edges
            .iter()
            .filter(|e| &e.dependency == dependency)
            .map(|e| e.importer.clone())
            .collect();
        found.into_iter().collect()
    }

    /// Direct dependencies of `importer`, sorted.
    pub fn dependencies_of(&self, importer: &SubrepoKey) -> Vec<SubrepoKey> {
        let found: BTreeSet<SubrepoKey> = self
            .edges
            .iter()
            .filter(|e| &e.importer == importer)
            .map(|e| e.dependency.clone())
            .collect();
        found.into_iter().collect()
    }

    /// Every subrepo reachable from `importer` through dependency edges.
    pub fn closure(&self, importer: &SubrepoKey) -> BTreeSet<SubrepoKey> {
        let mut seen = BTreeSet::new();
        let mut stack = self.dependencies_of(importer);
        while let Some(key) = stack.pop() {
            if &key == importer || !seen.insert(key.clone()) {
                continue;
            }
            stack.extend(self.dependencies_of(&key));
        }
        seen
    }

    /// Decide which dependencies go away together with `target`.
    ///
    /// An implicit dependency is removed once every one of its importers is
    /// removed; explicit subrepos are never removed behind the user's back.
    pub fn removal_plan(&self, target: &SubrepoKey) -> RemovalPlan {
        let closure = self.closure(target);
        let mut removed = BTreeSet::from([target.clone()]);

        loop {
            let mut changed = false;
            for key in &closure {
                if removed.contains(key) {
                    continue;
                }
                let explicit = self.nodes.get(key).is_some_and(|n| n.explicit);
                if explicit {
                    continue;
                }
                let orphaned = self
                    .dependents_of(key)
                    .iter()
                    .all(|importer| removed.contains(importer));
                if orphaned {
                    removed.insert(key.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        removed.remove(target);
        let retained = closure
            .iter()
            .filter(|k| !removed.contains(*k))
            .cloned()
            .collect();
        RemovalPlan {
            removed: removed.into_iter().collect(),
            retained,
        }
    }
}
