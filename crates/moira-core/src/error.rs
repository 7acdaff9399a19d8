//! Error types for Moira operations.
//!
//! Every failure surfaced by the client falls into one of a small number of
//! categories. Transport and framing failures are fatal to the connection they
//! occurred on; server statuses are structured and left to the caller's
//! business logic.

use serde::Serialize;
use thiserror::Error;

use crate::status;

/// Main error type for Moira operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or unexpected framing, handshake or version data
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport failure (stream closed early, handshake mismatch)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Numeric status returned by the server in response to a request
    #[error("Server error {code}: {message}")]
    Server {
        /// Raw status code
        code: i32,
        /// Human-readable description of the status
        message: String,
    },

    /// The server announced an outage notice during session bootstrap
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Local precondition violation, never caused by the server
    #[error("User error: {0}")]
    User(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Specialized result type for Moira operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Numeric server status, when the error came from the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_code: Option<i32>,
}

impl Error {
    /// Builds a [`Error::Server`] for the given status, looking up its description.
    #[must_use]
    pub fn server(code: i32) -> Self {
        let message = status::describe(code).map_or_else(
            || format!("Unknown server error (code {code})"),
            str::to_string,
        );
        Self::Server { code, message }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Server { .. } => "SERVER_ERROR",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::User(_) => "USER_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Returns the numeric status carried by a server error.
    #[must_use]
    pub const fn server_code(&self) -> Option<i32> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if the server rejected the request for access reasons.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Server { code, .. } if *code == status::MR_PERM)
    }

    /// Returns true if the connection the error occurred on must be discarded.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Connection(_) | Self::Unavailable(_) | Self::Timeout(_)
        )
    }

    /// Converts the error into an [`ErrorResponse`].
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code(),
            server_code: self.server_code(),
            message: self.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Protocol("x".into()).error_code(), "PROTOCOL_ERROR");
        assert_eq!(
            Error::Connection("x".into()).error_code(),
            "CONNECTION_ERROR"
        );
        assert_eq!(Error::server(status::MR_PERM).error_code(), "SERVER_ERROR");
        assert_eq!(Error::Unavailable("x".into()).error_code(), "UNAVAILABLE");
        assert_eq!(Error::User("x".into()).error_code(), "USER_ERROR");
        assert_eq!(Error::Config("x".into()).error_code(), "CONFIG_ERROR");
        assert_eq!(
            Error::Validation("x".into()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(Error::Timeout("x".into()).error_code(), "TIMEOUT");
    }

    #[test]
    fn test_server_error_known_code() {
        let err = Error::server(status::MR_NO_MATCH);
        assert_eq!(err.server_code(), Some(status::MR_NO_MATCH));
        assert!(err.to_string().contains("No records in database match query"));
    }

    #[test]
    fn test_server_error_unknown_code() {
        let err = Error::server(-1_765_328_228);
        assert_eq!(
            err.to_string(),
            "Server error -1765328228: Unknown server error (code -1765328228)"
        );
    }

    #[test]
    fn test_permission_denied_matcher() {
        assert!(Error::server(status::MR_PERM).is_permission_denied());
        assert!(!Error::server(status::MR_NO_MATCH).is_permission_denied());
        assert!(!Error::Protocol("perm".into()).is_permission_denied());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::Protocol("x".into()).is_fatal());
        assert!(Error::Connection("x".into()).is_fatal());
        assert!(Error::Unavailable("x".into()).is_fatal());
        assert!(!Error::server(status::MR_PERM).is_fatal());
        assert!(!Error::User("x".into()).is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "early eof").into();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_string(&Error::server(status::MR_PERM).into_error_response())
            .unwrap();
        assert!(json.contains("SERVER_ERROR"));
        assert!(json.contains(&status::MR_PERM.to_string()));

        let json = serde_json::to_string(&Error::User("bad".into()).into_error_response()).unwrap();
        assert!(!json.contains("server_code"));
    }
}
