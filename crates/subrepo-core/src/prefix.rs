//! Canonical subrepo prefixes
//!
//! A prefix is the repository-relative directory a subrepo's content lives
//! under. Internally it always uses forward slashes, never carries a trailing
//! separator and is `.` for the repository root.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::{Error, Result};

/// A normalized, repository-relative subrepo location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Prefix {
    /// Either "." or slash separated components without "." or ".."
    inner: String,
}

impl Prefix {
    /// The repository root.
    pub fn root() -> Self {
        Self { inner: ".".into() }
    }

    /// Parse a repository-relative path into its canonical form.
    ///
    /// Backslashes count as separators, empty and `.` components are dropped
    /// and `..` pops the previous component. Absolute paths and paths that
    /// climb above the root are rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let unified = input.replace('\\', "/");
        if unified.starts_with('/') {
            return Err(Error::InvalidPrefix {
                prefix: input.into(),
                reason: "must be relative to the repository root".into(),
            });
        }

        let mut parts: Vec<&str> = Vec::new();
        for part in unified.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(Error::InvalidPrefix {
                            prefix: input.into(),
                            reason: "points outside of the repository".into(),
                        });
                    }
                }
                other => parts.push(other),
            }
        }

        if parts.is_empty() {
            Ok(Self::root())
        } else {
            Ok(Self {
                inner: parts.join("/"),
            })
        }
    }

    /// Resolve a user supplied path against the working directory.
    ///
    /// `cwd` and `workdir` are expected to be absolute. The returned prefix is
    /// relative to `workdir`.
    pub fn from_user_path(workdir: &Path, cwd: &Path, input: &str) -> Result<Self> {
        let candidate = Path::new(input);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            cwd.join(candidate)
        };
        let absolute = lexical_clean(&joined);
        let root = lexical_clean(workdir);

        let relative = absolute
            .strip_prefix(&root)
            .map_err(|_| Error::InvalidPrefix {
                prefix: input.into(),
                reason: format!("is outside of the repository at {}", root.display()),
            })?;
        Self::parse(&relative.to_string_lossy())
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn is_root(&self) -> bool {
        self.inner == "."
    }

    /// Nest `other` below this prefix.
    pub fn join(&self, other: &Prefix) -> Prefix {
        match (self.is_root(), other.is_root()) {
            (true, _) => other.clone(),
            (false, true) => self.clone(),
            (false, false) => Prefix {
                inner: format!("{}/{}", self.inner, other.inner),
            },
        }
    }

    /// Map a path relative to this prefix to a repository path.
    pub fn host_path(&self, relative: &str) -> String {
        if self.is_root() {
            relative.to_string()
        } else {
            format!("{}/{}", self.inner, relative)
        }
    }

    /// Map a repository path back to a path relative to this prefix.
    pub fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.is_root() {
            return Some(path);
        }
        path.strip_prefix(self.inner.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Whether the repository path lies below this prefix.
    pub fn contains(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }

    /// Whether `other` is nested strictly inside this prefix.
    pub fn is_strict_ancestor_of(&self, other: &Prefix) -> bool {
        self != other && !other.is_root() && self.contains(other.as_str())
    }

    /// Whether one of the two prefixes contains the other (or they are equal).
    pub fn overlaps(&self, other: &Prefix) -> bool {
        self == other || self.is_strict_ancestor_of(other) || other.is_strict_ancestor_of(self)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl std::str::FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
