//! git2 backed oracle
//!
//! Talks to libgit2 directly instead of shelling out, so content moves as
//! objects (binary safe) and a failed step never leaves a half-applied patch
//! behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, ErrorCode, Index, IndexEntry, IndexTime, ObjectType, Oid, Repository, Signature,
    Sort, TreeWalkMode, TreeWalkResult,
};

use crate::config::SubrepoConfig;
use crate::oracle::{Author, CommitId, CommitInfo, CommitWalk, Oracle, RemoteBranch};
use crate::snapshot::{FileEntry, Snapshot};
use crate::{Error, Result};

/// Oracle over a local git repository.
pub struct GitOracle {
    repo: Repository,
}

impl GitOracle {
    /// Open the repository containing `path`, searching parent directories.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path.as_ref())?;
        Ok(Self { repo })
    }

    pub fn from_repository(repo: Repository) -> Self {
        Self { repo }
    }

    /// Root of the working tree; `None` for bare repositories.
    pub fn workdir(&self) -> Option<PathBuf> {
        self.repo.workdir().map(Path::to_path_buf)
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Subrepo defaults from the repository's layered git configuration.
    pub fn config(&self) -> Result<SubrepoConfig> {
        SubrepoConfig::from_git(&self.repo.config()?)
    }

    fn oid(id: &CommitId) -> Result<Oid> {
        Oid::from_str(id.as_str()).map_err(Error::from)
    }

    fn find_commit(&self, id: &CommitId) -> Result<git2::Commit<'_>> {
        let oid = Self::oid(id)?;
        self.repo.find_commit(oid).map_err(|e| match e.code() {
            ErrorCode::NotFound => Error::CommitUnavailable { commit: id.clone() },
            _ => Error::Git(e),
        })
    }

    fn tree_of(&self, id: Option<&CommitId>) -> Result<Option<git2::Tree<'_>>> {
        match id {
            Some(id) => Ok(Some(self.find_commit(id)?.tree()?)),
            None => Ok(None),
        }
    }

    fn empty_tree(&self) -> Result<git2::Tree<'_>> {
        let oid = self.repo.treebuilder(None)?.write()?;
        Ok(self.repo.find_tree(oid)?)
    }

    /// Paths whose content differs between two commits (either may be unborn).
    fn changed_paths(&self, from: Option<&CommitId>, to: &CommitId) -> Result<Vec<PathBuf>> {
        let old = self.tree_of(from)?;
        let new = self.find_commit(to)?.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(old.as_ref(), Some(&new), None)?;

        let mut paths = Vec::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(path) = file.path()
                    && !paths.iter().any(|p: &PathBuf| p == path)
                {
                    paths.push(path.to_path_buf());
                }
            }
        }
        Ok(paths)
    }

    /// Name of the reference HEAD should move, `None` when detached.
    fn head_target(&self) -> Result<Option<String>> {
        let head = self.repo.find_reference("HEAD")?;
        Ok(head.symbolic_target().map(str::to_string))
    }
}

impl Oracle for GitOracle {
    fn head(&self) -> Result<Option<CommitId>> {
        match self.repo.head() {
            Ok(reference) => {
                let commit = reference.peel_to_commit()?;
                Ok(Some(CommitId::new(commit.id().to_string())))
            }
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        if self.repo.find_remote(remote).is_ok() {
            return Ok(true);
        }
        Ok(!self.remote_branches(remote)?.is_empty())
    }

    fn resolve_revision(&self, remote: &str, revision: &str) -> Result<CommitId> {
        let tracking = format!("refs/remotes/{remote}/{revision}");
        let object = self
            .repo
            .revparse_single(&tracking)
            .or_else(|_| self.repo.revparse_single(revision))
            .map_err(|_| Error::RevisionNotFound {
                remote: remote.into(),
                revision: revision.into(),
            })?;
        let commit = object.peel_to_commit().map_err(|_| Error::RevisionNotFound {
            remote: remote.into(),
            revision: revision.into(),
        })?;
        Ok(CommitId::new(commit.id().to_string()))
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<RemoteBranch>> {
        let leading = format!("{remote}/");
        let mut branches = Vec::new();

        for branch in self.repo.branches(Some(BranchType::Remote))? {
            let (branch, _) = branch?;
            let reference = branch.get();
            // refs/remotes/<remote>/HEAD is a symbolic alias of a real branch
            if reference.symbolic_target().is_some() {
                continue;
            }
            let Some(name) = branch.name()? else {
                continue;
            };
            let Some(short) = name.strip_prefix(&leading) else {
                continue;
            };
            if short == "HEAD" {
                continue;
            }
            let tip = reference.peel_to_commit()?;
            branches.push(RemoteBranch {
                name: short.to_string(),
                tip: CommitId::new(tip.id().to_string()),
            });
        }

        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let ancestor = Self::oid(ancestor)?;
        let descendant = Self::oid(descendant)?;
        Ok(self.repo.graph_descendant_of(descendant, ancestor)?)
    }

    fn contains(&self, id: &CommitId) -> bool {
        Oid::from_str(id.as_str())
            .and_then(|oid| self.repo.find_commit(oid))
            .is_ok()
    }

    fn log<'a>(&'a self, start: &CommitId) -> Result<CommitWalk<'a>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(Self::oid(start)?)?;

        Ok(Box::new(revwalk.map(|oid| {
            oid.map(|oid| CommitId::new(oid.to_string()))
                .map_err(Error::from)
        })))
    }

    fn commit_info(&self, id: &CommitId) -> Result<CommitInfo> {
        let commit = self.find_commit(id)?;
        let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();

        let signature = commit.author();
        let when = signature.when();
        let time: DateTime<Utc> = Utc
            .timestamp_opt(when.seconds(), 0)
            .single()
            .unwrap_or_default();
        let author = Author {
            name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
            when: FixedOffset::east_opt(when.offset_minutes() * 60)
                .map_or_else(|| time.fixed_offset(), |offset| time.with_timezone(&offset)),
        };

        Ok(CommitInfo {
            id: id.clone(),
            message,
            time,
            author,
            parents: commit
                .parent_ids()
                .map(|oid| CommitId::new(oid.to_string()))
                .collect(),
        })
    }

    fn snapshot(&self, id: &CommitId) -> Result<Snapshot> {
        let tree = self.find_commit(id)?.tree()?;
        let mut snapshot = Snapshot::new();

        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if matches!(entry.kind(), Some(ObjectType::Blob) | Some(ObjectType::Commit))
                && let Some(name) = entry.name()
            {
                snapshot.insert(
                    format!("{dir}{name}"),
                    FileEntry::new(entry.id().to_string(), entry.filemode() as u32),
                );
            }
            TreeWalkResult::Ok
        })?;

        Ok(snapshot)
    }

    fn create_commit(
        &self,
        parents: &[CommitId],
        content: &Snapshot,
        message: &str,
        author: Option<&Author>,
    ) -> Result<CommitId> {
        let mut index = Index::new()?;
        for (path, file) in content {
            let entry = IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: file.mode,
                uid: 0,
                gid: 0,
                file_size: 0,
                id: Oid::from_str(&file.id)?,
                flags: path.len().min(0xfff) as u16,
                flags_extended: 0,
                path: path.as_bytes().to_vec(),
            };
            index.add(&entry)?;
        }
        let tree_id = index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_id)?;

        let parents = parents
            .iter()
            .map(|p| self.find_commit(p))
            .collect::<Result<Vec<_>>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let committer = self.repo.signature()?;
        let author = match author {
            Some(author) => {
                let offset = author.when.offset().local_minus_utc() / 60;
                let time = git2::Time::new(author.when.timestamp(), offset);
                Signature::new(&author.name, &author.email, &time)?
            }
            None => committer.clone(),
        };
        let oid = self
            .repo
            .commit(None, &author, &committer, message, &tree, &parent_refs)?;

        tracing::debug!(commit = %oid, files = content.len(), "Created commit object");
        Ok(CommitId::new(oid.to_string()))
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let head = self.head()?;
        let tree = self.tree_of(head.as_ref())?;
        let index = self.repo.index()?;
        let diff = self
            .repo
            .diff_tree_to_index(tree.as_ref(), Some(&index), None)?;
        Ok(diff.deltas().len() > 0)
    }

    fn checkout(&self, from: Option<&CommitId>, to: &CommitId) -> Result<()> {
        let target = self.find_commit(to)?.tree()?;
        // Safe mode plans every update and fails on the first conflict before
        // writing any file.
        let mut opts = CheckoutBuilder::new();
        opts.safe();
        if from.is_none() {
            // Nothing is tracked yet, so every file of the target is new.
            opts.recreate_missing(true);
        }
        self.repo
            .checkout_tree(target.as_object(), Some(&mut opts))
            .map_err(|e| Error::oracle("checkout", e.message()))
    }

    fn restore(&self, from: Option<&CommitId>, to: &CommitId) -> Result<()> {
        let paths = self.changed_paths(from, to)?;
        if paths.is_empty() {
            return Ok(());
        }

        let original = match self.tree_of(from)? {
            Some(tree) => tree,
            None => self.empty_tree()?,
        };
        let mut opts = CheckoutBuilder::new();
        opts.force().remove_untracked(true);
        for path in &paths {
            opts.path(path.as_path());
        }
        self.repo
            .checkout_tree(original.as_object(), Some(&mut opts))
            .map_err(|e| Error::oracle("restore", e.message()))
    }

    fn set_head(&self, id: &CommitId, reflog: &str) -> Result<()> {
        let oid = Self::oid(id)?;
        match self.head_target()? {
            Some(branch) => {
                self.repo.reference(&branch, oid, true, reflog)?;
            }
            None => self.repo.set_head_detached(oid)?,
        }
        tracing::info!(commit = %id, "Moved HEAD");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init() -> (TempDir, GitOracle) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        (temp_dir, GitOracle::from_repository(repo))
    }

    fn blob(oracle: &GitOracle, data: &[u8]) -> FileEntry {
        let oid = oracle.repository().blob(data).unwrap();
        FileEntry::new(oid.to_string(), crate::snapshot::MODE_FILE)
    }

    #[test]
    fn test_unborn_head() {
        let (_temp, oracle) = init();
        assert_eq!(oracle.head().unwrap(), None);
        assert!(!oracle.has_staged_changes().unwrap());
    }

    #[test]
    fn test_create_commit_and_snapshot() {
        let (_temp, oracle) = init();
        let mut content = Snapshot::new();
        content.insert("a.txt", blob(&oracle, b"a"));
        content.insert("dir/b.bin", blob(&oracle, &[0, 159, 146, 150]));

        let id = oracle.create_commit(&[], &content, "Initial\n", None).unwrap();
        assert_eq!(oracle.snapshot(&id).unwrap(), content);
        // Only an object was written, HEAD is untouched.
        assert_eq!(oracle.head().unwrap(), None);

        oracle.checkout(None, &id).unwrap();
        oracle.set_head(&id, "test").unwrap();
        assert_eq!(oracle.head().unwrap(), Some(id.clone()));
        assert!(!oracle.has_staged_changes().unwrap());

        let log: Vec<CommitId> = oracle.log(&id).unwrap().map(|c| c.unwrap()).collect();
        assert_eq!(log, vec![id]);
    }

    #[test]
    fn test_create_commit_with_author() {
        let (_temp, oracle) = init();
        let when = DateTime::parse_from_rfc3339("2020-05-05T05:05:05+02:00").unwrap();
        let author = Author {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            when,
        };

        let id = oracle
            .create_commit(&[], &Snapshot::new(), "Authored\n", Some(&author))
            .unwrap();
        let info = oracle.commit_info(&id).unwrap();
        assert_eq!(info.author, author);
        assert_eq!(info.time, when.with_timezone(&Utc));

        let commit = oracle.repository().find_commit(GitOracle::oid(&id).unwrap()).unwrap();
        assert_eq!(commit.committer().name(), Some("Test User"));
    }

    #[test]
    fn test_missing_commit_is_unavailable() {
        let (_temp, oracle) = init();
        let ghost = CommitId::new("1111111111111111111111111111111111111111");
        assert!(!oracle.contains(&ghost));
        assert!(matches!(
            oracle.commit_info(&ghost),
            Err(Error::CommitUnavailable { .. })
        ));
    }
}
