use pretty_assertions::assert_eq;
use subrepo_core::{
    Engine, Error, GitOracle, ImportOptions, ImportOutcome, Prefix, SubrepoKey, render_tree,
};
use subrepo_test_utils::GitRepo;
use subrepo_test_utils::upstream::{library, nested_chain};

fn prefix(p: &str) -> Prefix {
    Prefix::parse(p).unwrap()
}

// ============================================================================
// First import and update
// ============================================================================

#[test]
fn test_import_then_update() {
    let (lib, revs) = library("lib", 2);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);

    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    let outcome = engine
        .import("lib", &prefix("src/lib"), &revs[0], &ImportOptions::default())
        .unwrap();
    assert!(matches!(outcome, ImportOutcome::Committed { .. }));
    assert_eq!(host.history_len(), 2);
    assert_eq!(host.read("src/lib/lib.txt"), "lib v1\n");
    assert_eq!(host.subject("HEAD"), "Import 'lib' at 'src/lib'");
    let first = host.head();

    let forest = engine.forest().unwrap();
    let graph = engine.graph(&forest).unwrap();
    assert_eq!(
        render_tree(&forest, &graph),
        format!("src/lib:lib at {}\n", revs[0])
    );

    engine
        .import("lib", &prefix("src/lib"), "main", &ImportOptions::default())
        .unwrap();
    assert_eq!(host.history_len(), 3);
    assert_eq!(host.read("src/lib/lib.txt"), "lib v2\n");
    // The first import commit is untouched
    assert_eq!(host.rev_parse("HEAD~1"), first);
    assert_eq!(host.parents("HEAD"), vec![first]);
    assert!(host.message("HEAD").contains(&format!("Subrepo-Commit: {}", revs[1])));
    assert!(!oracle_has_staged(&host));
}

fn oracle_has_staged(host: &GitRepo) -> bool {
    use subrepo_core::oracle::Oracle;
    GitOracle::discover(host.path())
        .unwrap()
        .has_staged_changes()
        .unwrap()
}

#[test]
fn test_import_twice_is_noop() {
    let (lib, revs) = library("lib", 1);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine
        .import("lib", &prefix("lib"), &revs[0], &ImportOptions::default())
        .unwrap();
    let again = engine
        .import("lib", &prefix("lib"), &revs[0], &ImportOptions::default())
        .unwrap();

    assert!(matches!(again, ImportOutcome::UpToDate { .. }));
    assert_eq!(host.history_len(), 2);
}

#[test]
fn test_import_into_fresh_repository_at_root() {
    let (lib, _) = library("lib", 1);
    let host = GitRepo::new();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();

    Engine::new(&oracle)
        .import("lib", &Prefix::root(), "main", &ImportOptions::default())
        .unwrap();

    assert_eq!(host.history_len(), 1);
    assert!(host.parents("HEAD").is_empty());
    assert_eq!(host.tracked_files(), vec!["lib.txt".to_string()]);
}

// ============================================================================
// Content fidelity
// ============================================================================

#[test]
fn test_binary_and_executable_content() {
    let upstream = GitRepo::new();
    let binary: Vec<u8> = (0u8..=255).rev().collect();
    upstream.write("data.bin", &binary);
    upstream.write("run.sh", "#!/bin/sh\necho hi\n");
    upstream.git(&["add", "-A"]);
    upstream.git(&["update-index", "--chmod=+x", "run.sh"]);
    upstream.git(&["commit", "--quiet", "-m", "Tools"]);

    let host = GitRepo::with_initial_commit();
    host.add_remote("tools", &upstream);
    let oracle = GitOracle::discover(host.path()).unwrap();

    Engine::new(&oracle)
        .import("tools", &prefix("tools"), "main", &ImportOptions::default())
        .unwrap();

    assert_eq!(host.read_bytes("tools/data.bin"), binary);
    let listing = host.git(&["ls-tree", "HEAD", "tools/run.sh"]);
    assert!(listing.starts_with("100755"), "unexpected mode: {listing}");
}

#[test]
fn test_local_files_outside_prefix_survive() {
    let (lib, revs) = library("lib", 2);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine
        .import("lib", &prefix("lib"), &revs[0], &ImportOptions::default())
        .unwrap();
    host.write("app/main.c", "int main() {}\n");
    host.commit_all("Add app");

    engine
        .import("lib", &prefix("lib"), &revs[1], &ImportOptions::default())
        .unwrap();
    assert_eq!(
        host.tracked_files(),
        vec!["README.md", "app/main.c", "lib/lib.txt"]
    );
}

// ============================================================================
// Refusals
// ============================================================================

#[test]
fn test_commit_outside_remote_needs_force() {
    let (lib, _) = library("lib", 1);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);

    // A commit that exists locally but on no branch of `lib`
    host.write("stray.txt", "stray");
    let stray = host.commit_all("Stray");
    host.git(&["reset", "--quiet", "--hard", "HEAD~1"]);

    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);
    let err = engine
        .import("lib", &prefix("stray"), &stray, &ImportOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::CommitNotInRemote { .. }));
    assert_eq!(host.history_len(), 1);

    let forced = ImportOptions {
        force: true,
        ..ImportOptions::default()
    };
    engine.import("lib", &prefix("stray"), &stray, &forced).unwrap();
    assert!(host.exists("stray/stray.txt"));
}

#[test]
fn test_dirty_index_leaves_repository_untouched() {
    let (lib, revs) = library("lib", 1);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    host.write("wip.txt", "work in progress");
    host.git(&["add", "wip.txt"]);

    let oracle = GitOracle::discover(host.path()).unwrap();
    let err = Engine::new(&oracle)
        .import("lib", &prefix("lib"), &revs[0], &ImportOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::DirtyIndex));
    assert_eq!(host.history_len(), 1);
    assert!(!host.exists("lib/lib.txt"));
}

#[test]
fn test_conflicting_local_edit_rolls_back() {
    let (lib, revs) = library("lib", 2);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine
        .import("lib", &prefix("lib"), &revs[0], &ImportOptions::default())
        .unwrap();
    let before = host.head();

    // Unstaged edit to a file the update would rewrite
    host.write("lib/lib.txt", "local edit\n");
    let err = engine
        .import("lib", &prefix("lib"), &revs[1], &ImportOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::Oracle { .. }));
    assert_eq!(host.head(), before);
    assert_eq!(host.read("lib/lib.txt"), "local edit\n");
}

// ============================================================================
// Nested dependencies
// ============================================================================

#[test]
fn test_root_import_reports_nested_dependencies() {
    let chain = nested_chain();
    let host = GitRepo::new();
    chain.add_remotes(&host);
    let oracle = GitOracle::discover(host.path()).unwrap();

    let outcome = Engine::new(&oracle)
        .import("lib3rdparty", &Prefix::root(), "main", &ImportOptions::default())
        .unwrap();

    let ImportOutcome::Committed { dependencies, .. } = outcome else {
        panic!("expected a commit");
    };
    assert_eq!(
        dependencies,
        vec![
            SubrepoKey::new(Prefix::root(), "lib2"),
            SubrepoKey::new(prefix("deps/lib1"), "lib1"),
        ]
    );
    assert_eq!(
        host.tracked_files(),
        vec!["deps/lib1/lib1.txt", "lib2.txt", "lib3.txt"]
    );
}

#[test]
fn test_unreadable_nested_history_leaves_head_alone() {
    let (lib, _) = library("lib", 1);
    lib.write("NOTES.md", "trailers\n");
    lib.commit_all("Document trailers\n\nSubrepo-Remote: example\n");
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let before = host.head();

    let oracle = GitOracle::discover(host.path()).unwrap();
    let err = Engine::new(&oracle)
        .import("lib", &prefix("lib"), "main", &ImportOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::MalformedMessage { .. }));
    assert_eq!(host.head(), before);
    assert_eq!(host.history_len(), 1);
    assert!(!host.exists("lib/lib.txt"));
    assert!(!oracle_has_staged(&host));
}
