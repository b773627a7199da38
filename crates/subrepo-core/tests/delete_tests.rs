use pretty_assertions::assert_eq;
use subrepo_core::{
    DeleteOptions, Engine, Error, GitOracle, ImportOptions, Prefix, SubrepoKey, TrailerCodec,
};
use subrepo_core::message::MessageCodec;
use subrepo_test_utils::GitRepo;
use subrepo_test_utils::upstream::{library, nested_chain, vendor};

#[test]
fn test_delete_restores_previous_tree() {
    let (lib, _) = library("lib", 1);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);
    let prefix = Prefix::parse("third_party/lib").unwrap();

    engine
        .import("lib", &prefix, "main", &ImportOptions::default())
        .unwrap();
    engine
        .delete("lib", &prefix, &DeleteOptions::default())
        .unwrap();

    assert_eq!(host.history_len(), 3);
    assert_eq!(host.subject("HEAD"), "Delete 'lib' at 'third_party/lib'");
    assert_eq!(host.tracked_files(), vec!["README.md"]);
    assert!(!host.exists("third_party/lib/lib.txt"));
    assert!(engine.forest().unwrap().is_empty());
}

#[test]
fn test_root_import_chain_is_deleted_in_one_commit() {
    let chain = nested_chain();
    let host = GitRepo::with_initial_commit();
    chain.add_remotes(&host);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine
        .import("lib3rdparty", &Prefix::root(), "main", &ImportOptions::default())
        .unwrap();
    let outcome = engine
        .delete("lib3rdparty", &Prefix::root(), &DeleteOptions::default())
        .unwrap();

    assert_eq!(
        outcome.removed,
        vec![
            SubrepoKey::new(Prefix::root(), "lib2"),
            SubrepoKey::new(Prefix::parse("deps/lib1").unwrap(), "lib1"),
        ]
    );
    assert!(outcome.retained.is_empty());
    assert_eq!(host.history_len(), 3);
    assert_eq!(host.tracked_files(), vec!["README.md"]);

    let body = TrailerCodec.body(&host.message("HEAD"));
    assert_eq!(
        body,
        "Removes implicit dependency 'lib2' at '.'\n\
         Removes implicit dependency 'lib1' at 'deps/lib1'"
    );
}

#[test]
fn test_absorbed_root_import_goes_with_its_absorber() {
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

    let forest = engine.forest().unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest.absorbed_root("lib2").unwrap().by, "lib3rdparty");

    let err = engine
        .delete("lib2", &Prefix::root(), &DeleteOptions::default())
        .unwrap_err();
    match err {
        Error::StillReferenced { importers, .. } => {
            assert_eq!(importers, vec![SubrepoKey::new(Prefix::root(), "lib3rdparty")]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let outcome = engine
        .delete("lib3rdparty", &Prefix::root(), &DeleteOptions::default())
        .unwrap();
    assert_eq!(outcome.removed.len(), 2);
    assert_eq!(host.history_len(), 4);
    assert_eq!(host.tracked_files(), vec!["README.md"]);
    assert!(engine.forest().unwrap().is_empty());
    assert!(matches!(
        engine.delete("lib2", &Prefix::root(), &DeleteOptions::default()),
        Err(Error::SubrepoNotFound { .. })
    ));
}

#[test]
fn test_shared_dependency_is_reference_counted() {
    let (c, c_revs) = library("c", 1);
    let a = GitRepo::new();
    a.write("a.txt", "a\n");
    a.commit_all("a v1");
    vendor(&a, &c, "c", "vendor/c", &c_revs[0]);
    let b = GitRepo::new();
    b.write("b.txt", "b\n");
    b.commit_all("b v1");
    vendor(&b, &c, "c", "vendor/c", &c_revs[0]);

    let host = GitRepo::with_initial_commit();
    host.add_remote("a", &a);
    host.add_remote("b", &b);
    host.add_remote("c", &c);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);

    engine.import("a", &Prefix::root(), "main", &ImportOptions::default()).unwrap();
    engine.import("b", &Prefix::root(), "main", &ImportOptions::default()).unwrap();
    assert_eq!(
        host.tracked_files(),
        vec!["README.md", "a.txt", "b.txt", "vendor/c/c.txt"]
    );

    let shared = SubrepoKey::new(Prefix::parse("vendor/c").unwrap(), "c");

    let first = engine.delete("a", &Prefix::root(), &DeleteOptions::default()).unwrap();
    assert!(first.removed.is_empty());
    assert_eq!(first.retained, vec![shared.clone()]);
    assert_eq!(host.tracked_files(), vec!["README.md", "b.txt", "vendor/c/c.txt"]);

    let second = engine.delete("b", &Prefix::root(), &DeleteOptions::default()).unwrap();
    assert_eq!(second.removed, vec![shared]);
    assert_eq!(host.tracked_files(), vec!["README.md"]);
}

#[test]
fn test_delete_errors() {
    let (lib, _) = library("lib", 1);
    let host = GitRepo::with_initial_commit();
    host.add_remote("lib", &lib);
    let oracle = GitOracle::discover(host.path()).unwrap();
    let engine = Engine::new(&oracle);
    let prefix = Prefix::parse("lib").unwrap();

    assert!(matches!(
        engine.delete("lib", &prefix, &DeleteOptions::default()),
        Err(Error::SubrepoNotFound { .. })
    ));

    engine
        .import("lib", &prefix, "main", &ImportOptions::default())
        .unwrap();
    let err = engine
        .delete("other", &prefix, &DeleteOptions::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "Prefix 'lib' holds subrepo 'lib', not 'other'");
    assert_eq!(host.history_len(), 2);
}
