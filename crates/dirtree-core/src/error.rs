//! Directory error types
//!
//! Error definitions with configuration / connection / transient / logic
//! classification for the reconnect-and-retry policy.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error that can occur while talking to, or building trees from, a directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // Configuration errors (fatal, never retried)
    /// Connection parameters are invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A distinguished name could not be parsed.
    #[error("name not valid: '{input}': {message}")]
    InvalidName { input: String, message: String },

    /// A search filter was rejected by the client or the server.
    #[error("invalid search filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    // Connection errors (fatal, never retried)
    /// The session to the directory could not be opened.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The session to the directory could not be closed.
    #[error("failed to close directory session: {message}")]
    CloseFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Transient errors (retried after a reconnect)
    /// A directory call timed out while waiting for the server.
    #[error("read timed out: {message}")]
    ReadTimeout {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    // Logic errors (fatal, signal a bug or inconsistent data)
    /// The reconnect ceiling was reached while recovering from transient errors.
    #[error("giving up after {attempts} reconnect attempts (limit {limit})")]
    ReconnectLimitExceeded { attempts: u32, limit: u32 },

    /// A structural guarantee did not hold.
    #[error("invariant violated: {message}")]
    InvariantViolation { message: String },

    /// A directory operation failed for a non-transient reason.
    #[error("directory operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl DirectoryError {
    /// Check if this error is transient and the operation should be retried
    /// on a fresh session.
    pub fn is_transient(&self) -> bool {
        matches!(self, DirectoryError::ReadTimeout { .. })
    }

    /// Check if this error was caused by bad input or configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DirectoryError::InvalidConfiguration { .. }
                | DirectoryError::InvalidName { .. }
                | DirectoryError::InvalidFilter { .. }
        )
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            DirectoryError::InvalidName { .. } => "INVALID_NAME",
            DirectoryError::InvalidFilter { .. } => "INVALID_FILTER",
            DirectoryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DirectoryError::CloseFailed { .. } => "CLOSE_FAILED",
            DirectoryError::ReadTimeout { .. } => "READ_TIMEOUT",
            DirectoryError::ReconnectLimitExceeded { .. } => "RECONNECT_LIMIT_EXCEEDED",
            DirectoryError::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            DirectoryError::OperationFailed { .. } => "OPERATION_FAILED",
        }
    }

    // Convenience constructors

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an invalid name error for the offending input.
    pub fn invalid_name(input: impl Into<String>, message: impl Into<String>) -> Self {
        DirectoryError::InvalidName {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create an invalid filter error.
    pub fn invalid_filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        DirectoryError::InvalidFilter {
            filter: filter.into(),
            message: message.into(),
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a close failed error with source.
    pub fn close_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::CloseFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a read timeout error.
    pub fn read_timeout(message: impl Into<String>) -> Self {
        DirectoryError::ReadTimeout {
            message: message.into(),
            source: None,
        }
    }

    /// Create a read timeout error with source.
    pub fn read_timeout_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ReadTimeout {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        DirectoryError::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error with source.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_read_timeout_is_transient() {
        assert!(DirectoryError::read_timeout("slow server").is_transient());

        let permanent_errors = vec![
            DirectoryError::invalid_configuration("host is required"),
            DirectoryError::invalid_name("cn==x", "bad"),
            DirectoryError::invalid_filter("(cn=x", "unbalanced"),
            DirectoryError::connection_failed("refused"),
            DirectoryError::ReconnectLimitExceeded {
                attempts: 10,
                limit: 10,
            },
            DirectoryError::invariant("two roots"),
            DirectoryError::operation_failed("noSuchObject"),
        ];

        for err in permanent_errors {
            assert!(
                !err.is_transient(),
                "Expected {} to not be transient",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_configuration_classification() {
        assert!(DirectoryError::invalid_name("x", "y").is_configuration());
        assert!(DirectoryError::invalid_filter("x", "y").is_configuration());
        assert!(!DirectoryError::connection_failed("x").is_configuration());
    }

    #[test]
    fn test_error_display() {
        let err = DirectoryError::invalid_name("ou,dc=x", "missing '=' in 'ou'");
        assert_eq!(
            err.to_string(),
            "name not valid: 'ou,dc=x': missing '=' in 'ou'"
        );

        let err = DirectoryError::ReconnectLimitExceeded {
            attempts: 2,
            limit: 2,
        };
        assert_eq!(
            err.to_string(),
            "giving up after 2 reconnect attempts (limit 2)"
        );
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let err = DirectoryError::read_timeout_with_source("search", source_err);

        assert!(err.is_transient());
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.error_code(), "READ_TIMEOUT");
    }
}
