//! CLI error types and exit codes

use dirtree_core::error::DirectoryError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 3: Connection error
/// - 4: Validation error
/// - 5: Directory error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 4,
            CliError::Io(_) | CliError::Output(_) => 1,
            CliError::Directory(err) => match err {
                DirectoryError::ConnectionFailed { .. }
                | DirectoryError::CloseFailed { .. }
                | DirectoryError::ReadTimeout { .. }
                | DirectoryError::ReconnectLimitExceeded { .. } => 3,
                err if err.is_configuration() => 4,
                _ => 5,
            },
        }
    }

    /// Print the error to stderr.
    pub fn print(&self) {
        eprintln!("Error: {self}");
        if let CliError::Directory(DirectoryError::ReconnectLimitExceeded { .. }) = self {
            eprintln!();
            eprintln!("The directory kept timing out. Check server load or raise");
            eprintln!("connection.read_timeout_secs / reconnect.max_attempts.");
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err.to_string())
    }
}
