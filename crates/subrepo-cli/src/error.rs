//! Error types for subrepo-cli

use subrepo_core::ErrorKind;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from subrepo-core
    #[error(transparent)]
    Core(#[from] subrepo_core::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e.kind() {
                ErrorKind::UserInput => 1,
                ErrorKind::Ambiguity => 2,
                ErrorKind::Integrity => 3,
                ErrorKind::Oracle => 128,
            },
            CliError::Io(_) | CliError::Json(_) | CliError::User { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subrepo_core::Error;

    #[test]
    fn test_cli_error_user() {
        let error = CliError::user("test error");
        assert_eq!(format!("{}", error), "test error");
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes_follow_error_kind() {
        assert_eq!(CliError::from(Error::DirtyIndex).exit_code(), 1);
        assert_eq!(
            CliError::from(Error::AmbiguousMatch { candidates: vec![] }).exit_code(),
            2
        );
        let malformed = Error::MalformedMessage {
            commit: None,
            reason: "missing Subrepo-Commit trailer".into(),
        };
        assert_eq!(CliError::from(malformed).exit_code(), 3);
        let oracle = Error::Oracle {
            operation: "checkout".into(),
            message: "index.lock exists".into(),
        };
        assert_eq!(CliError::from(oracle).exit_code(), 128);
    }

    #[test]
    fn test_core_message_is_transparent() {
        let error = CliError::from(Error::RemoteNotFound { name: "lib".into() });
        assert_eq!(error.to_string(), "Remote 'lib' not found");
    }
}
