//! Temporary git repositories driven through the `git` CLI.
//!
//! Fixtures are set up with the real `git` binary so that the code under test
//! (which uses libgit2) reads repositories exactly as users produce them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// A fresh repository on branch `main` with a deterministic identity.
///
/// All helpers panic on failure, naming the git command that failed.
pub struct GitRepo {
    temp_dir: TempDir,
}

impl Default for GitRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRepo {
    /// Initialise an empty repository (unborn `main`).
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap_or_else(|e| panic!("GitRepo::new: {e}"));
        let repo = Self { temp_dir };
        repo.git(&["init", "--quiet"]);
        // Works with git versions predating `init -b`
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.email", "test@test.com"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    /// Initialise a repository with a `README.md` in its first commit.
    pub fn with_initial_commit() -> Self {
        let repo = Self::new();
        repo.write("README.md", "# Host\n");
        repo.commit_all("Initial commit");
        repo
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of a file inside the working tree.
    pub fn join(&self, relative: &str) -> PathBuf {
        self.path().join(relative)
    }

    /// Open the repository with libgit2.
    pub fn repository(&self) -> git2::Repository {
        git2::Repository::open(self.path())
            .unwrap_or_else(|e| panic!("GitRepo::repository: {e}"))
    }

    /// Run git, returning trimmed stdout or the error output.
    pub fn try_git(&self, args: &[&str]) -> Result<String, String> {
        self.run(args, None)
    }

    /// Run git and return its trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        self.try_git(args)
            .unwrap_or_else(|e| panic!("`git {}` failed:\n{e}", args.join(" ")))
    }

    /// Run git with author and committer dates pinned to `date`.
    pub fn git_at(&self, date: &str, args: &[&str]) -> String {
        self.run(args, Some(date))
            .unwrap_or_else(|e| panic!("`git {}` failed:\n{e}", args.join(" ")))
    }

    fn run(&self, args: &[&str], date: Option<&str>) -> Result<String, String> {
        let mut command = Command::new("git");
        command.args(args).current_dir(self.path());
        if let Some(date) = date {
            command
                .env("GIT_AUTHOR_DATE", date)
                .env("GIT_COMMITTER_DATE", date);
        }
        let output = command
            .output()
            .map_err(|e| format!("failed to run git: {e}"))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).into_owned())
        }
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("GitRepo::write: {}: {e}", parent.display()));
        }
        fs::write(&path, contents)
            .unwrap_or_else(|e| panic!("GitRepo::write: {}: {e}", path.display()));
    }

    pub fn remove(&self, relative: &str) {
        let path = self.join(relative);
        fs::remove_file(&path)
            .unwrap_or_else(|e| panic!("GitRepo::remove: {}: {e}", path.display()));
    }

    pub fn read(&self, relative: &str) -> String {
        let path = self.join(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("GitRepo::read: {}: {e}", path.display()))
    }

    pub fn read_bytes(&self, relative: &str) -> Vec<u8> {
        let path = self.join(relative);
        fs::read(&path).unwrap_or_else(|e| panic!("GitRepo::read_bytes: {}: {e}", path.display()))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.join(relative).exists()
    }

    /// Stage everything and commit, returning the new commit id.
    pub fn commit_all(&self, message: &str) -> String {
        self.git(&["add", "-A"]);
        self.git(&["commit", "--quiet", "--allow-empty", "-m", message]);
        self.head()
    }

    /// Like [`GitRepo::commit_all`] with a fixed date, e.g. `2024-01-01T10:00:00Z`.
    pub fn commit_all_at(&self, message: &str, date: &str) -> String {
        self.git(&["add", "-A"]);
        self.git_at(date, &["commit", "--quiet", "--allow-empty", "-m", message]);
        self.head()
    }

    pub fn rev_parse(&self, rev: &str) -> String {
        self.git(&["rev-parse", "--verify", &format!("{rev}^{{commit}}")])
    }

    pub fn head(&self) -> String {
        self.rev_parse("HEAD")
    }

    /// First line of a commit message.
    pub fn subject(&self, rev: &str) -> String {
        self.git(&["log", "-1", "--format=%s", rev])
    }

    /// Full commit message.
    pub fn message(&self, rev: &str) -> String {
        self.git(&["log", "-1", "--format=%B", rev])
    }

    /// Parent ids of a commit.
    pub fn parents(&self, rev: &str) -> Vec<String> {
        self.git(&["log", "-1", "--format=%P", rev])
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Number of commits reachable from HEAD, 0 on an unborn branch.
    pub fn history_len(&self) -> usize {
        self.try_git(&["rev-list", "--count", "HEAD"])
            .ok()
            .and_then(|count| count.parse().ok())
            .unwrap_or(0)
    }

    /// Create `branch` at `start` and switch to it.
    pub fn checkout_new(&self, branch: &str, start: &str) {
        self.git(&["checkout", "--quiet", "-b", branch, start]);
    }

    pub fn checkout(&self, rev: &str) {
        self.git(&["checkout", "--quiet", rev]);
    }

    /// Register `upstream` as remote `name` and fetch it.
    pub fn add_remote(&self, name: &str, upstream: &GitRepo) {
        let url = upstream.path().to_string_lossy().into_owned();
        self.git(&["remote", "add", name, &url]);
        self.fetch(name);
    }

    /// Fetch `name`, pruning branches that were deleted or force-pushed.
    pub fn fetch(&self, name: &str) {
        self.git(&["fetch", "--quiet", "--prune", "--force", name]);
    }

    /// Content of `path` in commit `rev`, byte for byte.
    pub fn file_at(&self, rev: &str, path: &str) -> Vec<u8> {
        let object = format!("{rev}:{path}");
        let output = Command::new("git")
            .args(["show", object.as_str()])
            .current_dir(self.path())
            .output()
            .unwrap_or_else(|e| panic!("GitRepo::file_at: failed to run git: {e}"));
        if !output.status.success() {
            panic!(
                "GitRepo::file_at: {rev}:{path}: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        output.stdout
    }

    /// Paths of the tree of `rev`, sorted.
    pub fn files_at(&self, rev: &str) -> Vec<String> {
        let listing = self.git(&["ls-tree", "-r", "--name-only", rev]);
        let mut files: Vec<String> = listing.lines().map(str::to_string).collect();
        files.sort();
        files
    }

    /// Paths tracked at HEAD, sorted.
    pub fn tracked_files(&self) -> Vec<String> {
        let listing = self.git(&["ls-files"]);
        let mut files: Vec<String> = listing.lines().map(str::to_string).collect();
        files.sort();
        files
    }
}
