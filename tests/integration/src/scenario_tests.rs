//! End-to-end subrepo scenarios against real git repositories
//!
//! Each test builds upstream repositories with the git CLI, registers them as
//! remotes of a host and drives the library the way the command line does.

use pretty_assertions::assert_eq;
use subrepo_core::{
    DeleteOptions, Engine, Error, GitOracle, ImportOptions, ImportOutcome, Oracle, Prefix,
    ReimportOptions, ReimportOutcome, SubrepoKey, render_tree,
};
use subrepo_test_utils::GitRepo;
use subrepo_test_utils::upstream::{library, nested_chain, vendor};

fn prefix(p: &str) -> Prefix {
    Prefix::parse(p).unwrap()
}

fn tree(oracle: &GitOracle) -> String {
    let engine = Engine::new(oracle);
    let forest = engine.forest().unwrap();
    let graph = engine.graph(&forest).unwrap();
    render_tree(&forest, &graph)
}

// ============================================================================
// Import, update, delete
// ============================================================================

#[test]
fn scenario_first_import_into_fresh_repository() {
    let (lib, revs) = library("lib", 1);
    let host = GitRepo::new();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();

    Engine::new(&oracle)
        .import("lib", &prefix("src/lib"), &revs[0], &ImportOptions::default())
        .unwrap();

    assert_eq!(host.history_len(), 1);
    assert_eq!(tree(&oracle), format!("src/lib:lib at {}\n", revs[0]));
    let forest = Engine::new(&oracle).forest().unwrap();
    let entry = forest.get(&prefix("src/lib"), "lib").unwrap();
    assert_eq!(entry.commit.as_str(), revs[0]);
}

#[test]
fn scenario_update_to_descendant_appends_one_commit() {
    let (lib, revs) = library("lib", 2);
    let host = GitRepo::new();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine
        .import("lib", &prefix("src/lib"), &revs[0], &ImportOptions::default())
        .unwrap();
    let first = host.head();
    engine
        .import("lib", &prefix("src/lib"), &revs[1], &ImportOptions::default())
        .unwrap();

    assert_eq!(host.history_len(), 2);
    assert_eq!(host.parents("HEAD"), vec![first.clone()]);
    assert!(host.message(&first).contains(&format!("Subrepo-Commit: {}", revs[0])));
    assert_eq!(tree(&oracle), format!("src/lib:lib at {}\n", revs[1]));
}

#[test]
fn scenario_root_import_chain_and_delete() {
    let chain = nested_chain();
    let host = GitRepo::with_initial_commit();
    chain.add_remotes(&host);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine
        .import("lib3rdparty", &Prefix::root(), "main", &ImportOptions::default())
        .unwrap();
    assert_eq!(
        tree(&oracle),
        format!(
            ".:lib3rdparty at {}\n\
             └── .:lib2 at {}\n    \
             └── deps/lib1:lib1 at {}\n",
            chain.lib3_rev, chain.lib2_rev, chain.lib1_rev
        )
    );

    let outcome = engine
        .delete("lib3rdparty", &Prefix::root(), &DeleteOptions::default())
        .unwrap();
    assert_eq!(outcome.removed.len(), 2);
    assert_eq!(host.history_len(), 3);
    assert_eq!(host.tracked_files(), vec!["README.md"]);
    assert_eq!(tree(&oracle), "");
}

#[test]
fn scenario_root_import_absorbs_previous_root_import() {
    let chain = nested_chain();
    let host = GitRepo::with_initial_commit();
    chain.add_remotes(&host);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine
        .import("lib2", &Prefix::root(), "main", &ImportOptions::default())
        .unwrap();
    engine
        .import("lib3rdparty", &Prefix::root(), "main", &ImportOptions::default())
        .unwrap();
    assert_eq!(
        tree(&oracle),
        format!(
            ".:lib3rdparty at {}\n\
             └── .:lib2 at {}\n    \
             └── deps/lib1:lib1 at {}\n",
            chain.lib3_rev, chain.lib2_rev, chain.lib1_rev
        )
    );

    let outcome = engine
        .delete("lib3rdparty", &Prefix::root(), &DeleteOptions::default())
        .unwrap();
    assert_eq!(
        outcome.removed,
        vec![
            SubrepoKey::new(Prefix::root(), "lib2"),
            SubrepoKey::new(prefix("deps/lib1"), "lib1"),
        ]
    );
    assert_eq!(host.history_len(), 4);
    assert_eq!(host.tracked_files(), vec!["README.md"]);
    assert_eq!(tree(&oracle), "");
}

#[test]
fn scenario_import_is_idempotent() {
    let (lib, _) = library("lib", 1);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    let first = engine
        .import("lib", &prefix("lib"), "main", &ImportOptions::default())
        .unwrap();
    let second = engine
        .import("lib", &prefix("lib"), "main", &ImportOptions::default())
        .unwrap();

    assert!(matches!(first, ImportOutcome::Committed { .. }));
    assert!(matches!(second, ImportOutcome::UpToDate { .. }));
    assert_eq!(host.history_len(), 2);
}

#[test]
fn scenario_shared_dependency_outlives_first_importer() {
    let (c, c_revs) = library("c", 1);
    let a = GitRepo::new();
    a.write("a.txt", "a\n");
    a.commit_all("a v1");
    vendor(&a, &c, "c", "third_party/c", &c_revs[0]);
    let b = GitRepo::new();
    b.write("b.txt", "b\n");
    b.commit_all("b v1");
    vendor(&b, &c, "c", "third_party/c", &c_revs[0]);

    let host = GitRepo::with_initial_commit();
    for (name, upstream) in [("a", &a), ("b", &b), ("c", &c)] {
        host.add_remote(name, upstream);
    }
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);
    engine.import("a", &Prefix::root(), "main", &ImportOptions::default()).unwrap();
    engine.import("b", &Prefix::root(), "main", &ImportOptions::default()).unwrap();

    let shared = SubrepoKey::new(prefix("third_party/c"), "c");
    let forest = engine.forest().unwrap();
    let graph = engine.graph(&forest).unwrap();
    assert_eq!(
        graph.dependents_of(&shared),
        vec![
            SubrepoKey::new(Prefix::root(), "a"),
            SubrepoKey::new(Prefix::root(), "b"),
        ]
    );

    engine.delete("a", &Prefix::root(), &DeleteOptions::default()).unwrap();
    assert!(host.exists("third_party/c/c.txt"));
    assert!(!host.exists("a.txt"));

    engine.delete("b", &Prefix::root(), &DeleteOptions::default()).unwrap();
    assert!(!host.exists("third_party/c/c.txt"));
    assert_eq!(host.tracked_files(), vec!["README.md"]);
}

// ============================================================================
// History rewriting
// ============================================================================

#[test]
fn scenario_import_commits_survive_host_rebase() {
    let (lib, revs) = library("lib", 1);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);

    host.checkout_new("feature", "main");
    let oracle = GitOracle::discover(host.path()).unwrap();
    Engine::new(&oracle)
        .import("lib", &prefix("lib"), "main", &ImportOptions::default())
        .unwrap();

    host.checkout("main");
    host.write("CHANGELOG.md", "unreleased\n");
    host.commit_all("Start changelog");
    host.checkout("feature");
    host.git(&["rebase", "--quiet", "main"]);

    // Plain non-merge commits replay cleanly and keep their metadata
    assert_eq!(host.parents("HEAD"), vec![host.rev_parse("main")]);
    assert_eq!(tree(&oracle), format!("lib:lib at {}\n", revs[0]));
}

#[test]
fn scenario_reimport_after_upstream_rebase() {
    let lib = GitRepo::new();
    lib.write("lib.txt", "base\n");
    lib.commit_all("Base");
    lib.write("parser.txt", "parser\n");
    lib.commit_all("Add parser");

    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);
    engine
        .import("lib", &prefix("lib"), "main", &ImportOptions::default())
        .unwrap();

    // Upstream rewrites "Add parser" onto a new base; a stale branch keeps
    // another commit with the same subject.
    lib.checkout_new("stale", "HEAD~1");
    lib.write("parser.txt", "old parser\n");
    let stale = lib.commit_all("Add parser");
    lib.checkout("main");
    lib.git(&["reset", "--quiet", "--hard", "HEAD~1"]);
    lib.write("lib.txt", "base with fix\n");
    lib.commit_all("Fix base");
    lib.write("parser.txt", "parser\n");
    let rebased = lib.commit_all("Add parser");
    host.fetch("lib");

    let err = engine
        .reimport("lib", &prefix("lib"), &ReimportOptions::default())
        .unwrap_err();
    let Error::AmbiguousMatch { candidates } = &err else {
        panic!("expected an ambiguity, got {err}");
    };
    let mut commits: Vec<String> = candidates.iter().map(|c| c.commit.to_string()).collect();
    commits.sort();
    let mut expected = vec![stale, rebased.clone()];
    expected.sort();
    assert_eq!(commits, expected);

    let options = ReimportOptions {
        branch: Some("main".into()),
        use_date: false,
    };
    let report = engine.reimport("lib", &prefix("lib"), &options).unwrap();
    assert!(matches!(report.outcome, ReimportOutcome::Amended { .. }));
    assert_eq!(host.history_len(), 2);
    assert_eq!(host.read("lib/lib.txt"), "base with fix\n");
    assert_eq!(tree(&oracle), format!("lib:lib at {rebased}\n"));
}

// ============================================================================
// Forest invariants
// ============================================================================

#[test]
fn forest_entries_are_reachable_from_their_remote() {
    let (lib, revs) = library("lib", 3);
    let (util, _) = library("util", 2);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    host.add_remote("util", &util);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine.import("lib", &prefix("lib"), &revs[0], &ImportOptions::default()).unwrap();
    engine.import("util", &prefix("util"), "main", &ImportOptions::default()).unwrap();
    engine.import("lib", &prefix("lib"), &revs[2], &ImportOptions::default()).unwrap();
    engine.import("lib", &prefix("lib"), &revs[1], &ImportOptions::default()).unwrap();

    let forest = engine.forest().unwrap();
    assert_eq!(forest.len(), 2);
    for subrepo in forest.iter() {
        assert_eq!(forest.at(&subrepo.prefix).len(), 1);
        let branches = oracle.remote_branches(&subrepo.remote).unwrap();
        assert!(
            branches
                .iter()
                .any(|b| oracle.is_ancestor(&subrepo.commit, &b.tip).unwrap()),
            "{} is not on any branch of {}",
            subrepo.commit,
            subrepo.remote
        );
    }
    assert_eq!(forest.get(&prefix("lib"), "lib").unwrap().commit.as_str(), revs[1]);
}
