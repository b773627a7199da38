//! Subrepo metadata stored in commit messages.
//!
//! Every import and delete is an ordinary commit whose message carries the
//! operation in its subject and the full descriptor as trailers:
//!
//! ```text
//! Import 'lib' at 'src/lib'
//!
//! Optional free-form body.
//!
//! Subrepo-Remote: lib
//! Subrepo-Prefix: src/lib
//! Subrepo-Commit: 3f2a...
//! ```
//!
//! The trailers are authoritative. A message without any of them is an
//! ordinary commit; a message with only some of them is corrupt.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::oracle::CommitId;
use crate::prefix::Prefix;
use crate::{Error, Result};

pub const REMOTE_TRAILER: &str = "Subrepo-Remote";
pub const PREFIX_TRAILER: &str = "Subrepo-Prefix";
pub const COMMIT_TRAILER: &str = "Subrepo-Commit";

static TRAILER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Subrepo-Remote|Subrepo-Prefix|Subrepo-Commit):[ \t]*(.*?)[ \t]*$").unwrap()
});

static SUBJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Import|Delete) '.*' at '.*'$").unwrap());

static COMMIT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{7,64}$").unwrap());

/// Kind of change a subrepo commit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Import,
    Delete,
}

impl Operation {
    pub fn verb(self) -> &'static str {
        match self {
            Operation::Import => "Import",
            Operation::Delete => "Delete",
        }
    }

    fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "Import" => Some(Operation::Import),
            "Delete" => Some(Operation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// What a subrepo commit did, where, and with which upstream commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Descriptor {
    pub remote: String,
    pub prefix: Prefix,
    pub commit: CommitId,
    pub operation: Operation,
}

impl Descriptor {
    pub fn import(remote: impl Into<String>, prefix: Prefix, commit: CommitId) -> Self {
        Self {
            remote: remote.into(),
            prefix,
            commit,
            operation: Operation::Import,
        }
    }

    pub fn delete(remote: impl Into<String>, prefix: Prefix, commit: CommitId) -> Self {
        Self {
            remote: remote.into(),
            prefix,
            commit,
            operation: Operation::Delete,
        }
    }

    /// Human readable subject line.
    pub fn subject(&self) -> String {
        format!("{} '{}' at '{}'", self.operation, self.remote, self.prefix)
    }
}

/// Check that a remote name can be stored in a trailer unchanged.
pub fn validate_remote(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::RemoteNotFound { name: name.into() });
    }
    Ok(())
}

/// Encoding of descriptors into commit messages and back.
pub trait MessageCodec {
    /// Render a message for `descriptor` with an optional free-form body.
    fn encode(&self, descriptor: &Descriptor, body: &str) -> String;

    /// Extract the descriptor, `Ok(None)` for ordinary commits.
    fn decode(&self, message: &str) -> Result<Option<Descriptor>>;

    /// The free-form part of a message: neither subject nor metadata.
    fn body(&self, message: &str) -> String;
}

/// The `Subrepo-*` trailer format.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailerCodec;

impl MessageCodec for TrailerCodec {
    fn encode(&self, descriptor: &Descriptor, body: &str) -> String {
        let mut message = descriptor.subject();
        message.push_str("\n\n");

        let body = body.trim();
        if !body.is_empty() {
            message.push_str(body);
            message.push_str("\n\n");
        }

        message.push_str(&format!("{REMOTE_TRAILER}: {}\n", descriptor.remote));
        message.push_str(&format!("{PREFIX_TRAILER}: {}\n", descriptor.prefix));
        message.push_str(&format!("{COMMIT_TRAILER}: {}\n", descriptor.commit));
        message
    }

    fn decode(&self, message: &str) -> Result<Option<Descriptor>> {
        let subject = message.lines().next().unwrap_or("").trim_end();
        let (_, trailers) = split_trailers(message);

        let mut remote = None;
        let mut prefix = None;
        let mut commit = None;

        for line in trailers {
            let Some(caps) = TRAILER_PATTERN.captures(line) else {
                continue;
            };
            let key = &caps[1];
            let slot = match key {
                REMOTE_TRAILER => &mut remote,
                PREFIX_TRAILER => &mut prefix,
                _ => &mut commit,
            };
            if slot.is_some() {
                return Err(Error::malformed(format!("duplicate {key} trailer")));
            }
            *slot = Some(caps[2].to_string());
        }

        if remote.is_none() && prefix.is_none() && commit.is_none() {
            return Ok(None);
        }

        let remote = remote.ok_or_else(|| missing(REMOTE_TRAILER))?;
        let prefix = prefix.ok_or_else(|| missing(PREFIX_TRAILER))?;
        let commit = commit.ok_or_else(|| missing(COMMIT_TRAILER))?;

        if remote.is_empty() {
            return Err(Error::malformed("empty Subrepo-Remote trailer"));
        }
        let prefix = Prefix::parse(&prefix)
            .map_err(|e| Error::malformed(format!("bad Subrepo-Prefix trailer: {e}")))?;
        if !COMMIT_PATTERN.is_match(&commit) {
            return Err(Error::malformed(format!(
                "Subrepo-Commit '{commit}' is not a commit id"
            )));
        }

        let operation = SUBJECT_PATTERN
            .captures(subject)
            .and_then(|caps| Operation::from_verb(&caps[1]))
            .ok_or_else(|| {
                Error::malformed(format!(
                    "subject '{subject}' does not name an Import or Delete"
                ))
            })?;

        Ok(Some(Descriptor {
            remote,
            prefix,
            commit: CommitId::new(commit),
            operation,
        }))
    }

    fn body(&self, message: &str) -> String {
        let (mut kept, trailers) = split_trailers(message);
        kept.extend(trailers.into_iter().filter(|line| !TRAILER_PATTERN.is_match(line)));
        kept.join("\n").trim().to_string()
    }
}

/// Split the lines after the subject into the free-form paragraphs and the
/// final paragraph, the only one trailers are read from.
fn split_trailers(message: &str) -> (Vec<&str>, Vec<&str>) {
    let lines: Vec<&str> = message.lines().skip(1).collect();
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |i| i + 1);
    let start = lines[..end]
        .iter()
        .rposition(|line| line.trim().is_empty())
        .map_or(0, |i| i + 1);
    (lines[..start].to_vec(), lines[start..end].to_vec())
}

fn missing(key: &str) -> Error {
    Error::malformed(format!("missing {key} trailer"))
}

/// Last chance for the user to change a commit message before it is written.
pub trait MessageEditor {
    fn edit(&self, draft: &str) -> Result<String>;
}

/// Keeps the drafted message as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl MessageEditor for Verbatim {
    fn edit(&self, draft: &str) -> Result<String> {
        Ok(draft.to_string())
    }
}

impl<F> MessageEditor for F
where
    F: Fn(&str) -> Result<String>,
{
    fn edit(&self, draft: &str) -> Result<String> {
        self(draft)
    }
}

/// Draft a message, let `editor` adjust it and verify it still describes
/// `descriptor`.
pub fn finalize(
    codec: &dyn MessageCodec,
    descriptor: &Descriptor,
    body: &str,
    editor: &dyn MessageEditor,
) -> Result<String> {
    let draft = codec.encode(descriptor, body);
    let message = editor.edit(&draft)?;

    if message.trim().is_empty() {
        return Err(Error::Aborted {
            reason: "empty commit message".into(),
        });
    }

    match codec.decode(&message)? {
        Some(decoded) if decoded == *descriptor => Ok(message),
        Some(decoded) => Err(Error::malformed(format!(
            "edited message describes '{}' instead of '{}'",
            decoded.subject(),
            descriptor.subject()
        ))),
        None => Err(Error::malformed("edited message lost its Subrepo trailers")),
    }
}
