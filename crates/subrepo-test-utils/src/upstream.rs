//! Upstream repositories for subrepo scenarios.
//!
//! Subrepo commits are written here with their literal trailer text, so the
//! fixtures do not depend on the codec they are used to test.

use crate::git::GitRepo;

/// Commit message of a subrepo operation in the `Subrepo-*` trailer format.
pub fn subrepo_message(operation: &str, remote: &str, prefix: &str, commit: &str) -> String {
    format!(
        "{operation} '{remote}' at '{prefix}'\n\n\
         Subrepo-Remote: {remote}\n\
         Subrepo-Prefix: {prefix}\n\
         Subrepo-Commit: {commit}\n"
    )
}

/// A repository with `revisions` linear commits on `main`.
///
/// Revision `n` (1-based) writes `<name>.txt` containing `<name> v<n>` and
/// is committed with the subject `<name> v<n>`.
pub fn library(name: &str, revisions: usize) -> (GitRepo, Vec<String>) {
    let repo = GitRepo::new();
    let mut shas = Vec::with_capacity(revisions);
    for n in 1..=revisions {
        repo.write(&format!("{name}.txt"), format!("{name} v{n}\n"));
        shas.push(repo.commit_all(&format!("{name} v{n}")));
    }
    (repo, shas)
}

/// Copy the tree of `dependency` at `rev` below `prefix` of `repo` and commit
/// it as an import of `remote`.
pub fn vendor(
    repo: &GitRepo,
    dependency: &GitRepo,
    remote: &str,
    prefix: &str,
    rev: &str,
) -> String {
    for file in dependency.files_at(rev) {
        let target = if prefix == "." {
            file.clone()
        } else {
            format!("{prefix}/{file}")
        };
        repo.write(&target, dependency.file_at(rev, &file));
    }
    repo.commit_all(&subrepo_message("Import", remote, prefix, rev))
}

/// Three upstreams nested into each other.
///
/// `lib2` imports `lib1` at `deps/lib1`; `lib3rdparty` imports `lib2` at its
/// root and adds a file of its own.
pub struct NestedChain {
    pub lib1: GitRepo,
    pub lib2: GitRepo,
    pub lib3: GitRepo,
    pub lib1_rev: String,
    pub lib2_rev: String,
    pub lib3_rev: String,
}

pub fn nested_chain() -> NestedChain {
    let (lib1, lib1_revs) = library("lib1", 1);
    let lib1_rev = lib1_revs[0].clone();

    let lib2 = GitRepo::new();
    lib2.write("lib2.txt", "lib2\n");
    lib2.commit_all("lib2 v1");
    let lib2_rev = vendor(&lib2, &lib1, "lib1", "deps/lib1", &lib1_rev);

    let lib3 = GitRepo::new();
    vendor(&lib3, &lib2, "lib2", ".", &lib2_rev);
    lib3.write("lib3.txt", "lib3\n");
    let lib3_rev = lib3.commit_all("lib3 v1");

    NestedChain {
        lib1,
        lib2,
        lib3,
        lib1_rev,
        lib2_rev,
        lib3_rev,
    }
}

impl NestedChain {
    /// Register all three upstreams as remotes of `host`.
    pub fn add_remotes(&self, host: &GitRepo) {
        host.add_remote("lib1", &self.lib1);
        host.add_remote("lib2", &self.lib2);
        host.add_remote("lib3rdparty", &self.lib3);
    }
}
