//! Interactive commit message editing
//!
//! Uses dialoguer to open the user's editor on the drafted message, the way
//! `git commit` does.

use dialoguer::Editor;
use subrepo_core::{Error, MessageEditor};

const HELP: &str = "\
# Edit the message for this subrepo commit. Lines starting with '#' are
# ignored; an empty message aborts. Keep the Subrepo-* trailers intact.";

/// Opens `$GIT_EDITOR`, `$VISUAL` or `$EDITOR` on the draft.
pub struct LaunchEditor;

impl MessageEditor for LaunchEditor {
    fn edit(&self, draft: &str) -> subrepo_core::Result<String> {
        let mut editor = Editor::new();
        editor.extension(".gitcommit").require_save(true);
        if let Ok(command) = std::env::var("GIT_EDITOR") {
            editor.executable(command);
        }

        let text = format!("{}\n{HELP}\n", draft.trim_end());
        let edited = editor.edit(&text).map_err(|e| Error::Aborted {
            reason: format!("could not run the editor: {e}"),
        })?;
        match edited {
            Some(message) => Ok(strip_comments(&message)),
            None => Err(Error::Aborted {
                reason: "the editor was closed without saving".into(),
            }),
        }
    }
}

/// Drop comment lines and surrounding blank lines.
pub fn strip_comments(message: &str) -> String {
    let kept: Vec<&str> = message
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect();
    let mut text = kept.join("\n").trim().to_string();
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        let edited = "Import 'lib' at 'src'\n\nNote\n\n# help\n# more help\n\n";
        assert_eq!(strip_comments(edited), "Import 'lib' at 'src'\n\nNote\n");
    }

    #[test]
    fn test_only_comments_is_empty() {
        assert_eq!(strip_comments(HELP), "");
    }
}
