//! Tree rendering of live subrepos

use serde::Serialize;

use crate::graph::{DependencyGraph, SubrepoKey};
use crate::oracle::CommitId;
use crate::prefix::Prefix;
use crate::scan::Forest;

/// One subrepo with its dependencies, ready for display or serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub prefix: Prefix,
    pub remote: String,
    pub commit: CommitId,
    pub explicit: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TreeNode>,
}

/// Explicit subrepos sorted by prefix then remote, each carrying its
/// dependency tree.
pub fn tree_nodes(forest: &Forest, graph: &DependencyGraph) -> Vec<TreeNode> {
    forest
        .iter()
        .map(|subrepo| {
            let key = SubrepoKey::new(subrepo.prefix.clone(), subrepo.remote.clone());
            let mut path = vec![key.clone()];
            TreeNode {
                prefix: subrepo.prefix.clone(),
                remote: subrepo.remote.clone(),
                commit: subrepo.commit.clone(),
                explicit: true,
                available: graph.node(&key).is_none_or(|n| n.available),
                dependencies: children(graph, &key, &mut path),
            }
        })
        .collect()
}

fn children(
    graph: &DependencyGraph,
    key: &SubrepoKey,
    path: &mut Vec<SubrepoKey>,
) -> Vec<TreeNode> {
    let mut nodes = Vec::new();
    for dependency in graph.dependencies_of(key) {
        if path.contains(&dependency) {
            continue;
        }
        let Some(node) = graph.node(&dependency) else {
            continue;
        };
        path.push(dependency.clone());
        let dependencies = children(graph, &dependency, path);
        path.pop();
        nodes.push(TreeNode {
            prefix: dependency.prefix.clone(),
            remote: dependency.remote.clone(),
            commit: node.commit.clone(),
            explicit: node.explicit,
            available: node.available,
            dependencies,
        });
    }
    nodes
}

/// Render the forest as text, one subrepo per line:
///
/// ```text
/// .:lib3 at 5d0c...
/// └── .:lib2 at 9e41...
///     └── deps/lib1:lib1 at 0a7f...
/// src/lib:lib at 3f2a...
/// ```
pub fn render_tree(forest: &Forest, graph: &DependencyGraph) -> String {
    let mut out = String::new();
    for node in tree_nodes(forest, graph) {
        out.push_str(&line(&node));
        out.push('\n');
        render_children(&node.dependencies, "", &mut out);
    }
    out
}

fn render_children(nodes: &[TreeNode], indent: &str, out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        let last = i + 1 == nodes.len();
        let (branch, continuation) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(indent);
        out.push_str(branch);
        out.push_str(&line(node));
        out.push('\n');
        render_children(&node.dependencies, &format!("{indent}{continuation}"), out);
    }
}

fn line(node: &TreeNode) -> String {
    let mut text = format!("{}:{} at {}", node.prefix, node.remote, node.commit);
    if !node.available {
        text.push_str(" (not fetched)");
    }
    text
}
