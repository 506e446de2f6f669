/// Unified error handling for the tandem client
///
/// Every failure the client can surface is a variant of [`TandemError`]:
/// transport failures, error documents returned by the server, cursor
/// invalidation, replica-pair master discovery and caller contract violations.

use crate::core::Document;
use std::fmt;
use thiserror::Error;

/// Main error type for tandem operations
#[derive(Debug, Error)]
pub enum TandemError {
    /// Dial, send or receive failed at the transport.
    /// Sticky on the connection until a successful reconnect.
    #[error("Connection failure to {server}: {message}")]
    ConnectionFailure { server: String, message: String },

    /// The server answered, but the payload is an error document
    #[error("Remote query error: {message}")]
    RemoteQuery {
        message: String,
        code: Option<i64>,
        document: Document,
    },

    /// The server no longer knows this cursor; re-issue the query
    #[error("Cursor {cursor_id} not found on server for namespace {ns}")]
    CursorNotFound { ns: String, cursor_id: i64 },

    /// Neither side of the replica pair could be confirmed as master
    #[error("No master found: {message}")]
    NoMasterFound { message: String },

    /// The node we believed to be master says it no longer is
    #[error("Server {server} is not master")]
    NotMaster { server: String },

    /// `next()` was called on a cursor with nothing left to return
    #[error("Cursor is empty: check more() before calling next()")]
    EmptyCursor,

    /// An administrative command answered with `ok: 0`
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Host name could not be turned into a dialable address
    #[error("Address resolution failed for {host}: {message}")]
    AddressResolution { host: String, message: String },

    /// Namespace is not of the form `<database>.<collection>`
    #[error("Invalid namespace '{0}'")]
    InvalidNamespace(String),

    /// Malformed message or document on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Document could not be encoded or decoded
    #[error("Document error: {0}")]
    Document(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for tandem operations
pub type TandemResult<T> = Result<T, TandemError>;

/// Convenience methods for creating specific error types
impl TandemError {
    /// Create a connection failure error
    pub fn connection<S: Into<String>, M: fmt::Display>(server: S, message: M) -> Self {
        TandemError::ConnectionFailure {
            server: server.into(),
            message: message.to_string(),
        }
    }

    /// Create a no-master error
    pub fn no_master<S: Into<String>>(message: S) -> Self {
        TandemError::NoMasterFound {
            message: message.into(),
        }
    }

    /// Create a command failure error
    pub fn command<S: Into<String>, M: Into<String>>(command: S, message: M) -> Self {
        TandemError::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        TandemError::Protocol(message.into())
    }

    /// True for transport-level failures
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, TandemError::ConnectionFailure { .. })
    }

    /// True when the error says the answering node is not the master,
    /// either as a typed error or as a remote error document.
    pub fn is_not_master(&self) -> bool {
        match self {
            TandemError::NotMaster { .. } => true,
            TandemError::RemoteQuery { message, .. } => is_not_master_message(message),
            _ => false,
        }
    }

    /// Check if this error is recoverable (a later call may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TandemError::ConnectionFailure { .. }
                | TandemError::NotMaster { .. }
                | TandemError::NoMasterFound { .. }
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TandemError::Config(_) => ErrorSeverity::Critical,
            TandemError::Protocol(_) => ErrorSeverity::Critical,
            TandemError::ConnectionFailure { .. } => ErrorSeverity::Warning,
            TandemError::NoMasterFound { .. } => ErrorSeverity::Warning,
            TandemError::NotMaster { .. } => ErrorSeverity::Info,
            TandemError::CursorNotFound { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Servers report a lost mastership with a message containing "not master".
pub fn is_not_master_message(message: &str) -> bool {
    message.contains("not master")
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = TandemError::connection("db1:27017", "connection refused");
        assert!(error.is_connection_failure());
        assert_eq!(
            error.to_string(),
            "Connection failure to db1:27017: connection refused"
        );
    }

    #[test]
    fn test_error_severity() {
        let config_error = TandemError::Config(ConfigError::ValidationError("test".to_string()));
        assert_eq!(config_error.severity(), ErrorSeverity::Critical);

        let network_error = TandemError::connection("db1", "reset");
        assert_eq!(network_error.severity(), ErrorSeverity::Warning);
        assert_eq!(network_error.severity().to_string(), "WARNING");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(TandemError::connection("db1", "reset").is_recoverable());
        assert!(TandemError::no_master("both down").is_recoverable());

        let cursor_error = TandemError::CursorNotFound {
            ns: "test.capped".to_string(),
            cursor_id: 9,
        };
        assert!(!cursor_error.is_recoverable());
        assert!(!TandemError::EmptyCursor.is_recoverable());
    }

    #[test]
    fn test_not_master_detection() {
        let remote = TandemError::RemoteQuery {
            message: "not master".to_string(),
            code: None,
            document: Document::new(),
        };
        assert!(remote.is_not_master());

        let other = TandemError::RemoteQuery {
            message: "bad query".to_string(),
            code: Some(10),
            document: Document::new(),
        };
        assert!(!other.is_not_master());
        assert!(TandemError::NotMaster {
            server: "db1".to_string()
        }
        .is_not_master());
    }
}
