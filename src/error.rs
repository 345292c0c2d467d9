//! Error types
//!
//! The crate exposes one top-level [`Error`] enum. Faults that form their
//! own families (configuration, server-origin, row decoding, pool) are
//! nested sub-enums so callers can match on them without string inspection.

use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid connection configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error on the underlying socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server closed the connection
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Operation attempted on a connection that is not connected
    #[error("connection is not established")]
    NotConnected,

    /// Malformed or unexpected protocol traffic
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server answered the SSLRequest with something other than 'S' or 'N'
    #[error("unexpected response to TLS request: 0x{0:02X}")]
    InvalidTlsResponse(u8),

    /// tls_mode=require but the server declined the TLS upgrade
    #[error("TLS required but the server does not support it")]
    TlsRequiredButUnavailable,

    /// TLS configuration or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Authentication exchange failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// SCRAM server signature did not verify
    #[error("server signature verification failed")]
    ServerSignatureMismatch,

    /// Error reported by the server in an ErrorResponse
    #[error(transparent)]
    Server(#[from] ServerError),

    /// RowDescription column count does not match the record schema
    #[error("row has {actual} columns, expected {expected}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    /// A row-producing response arrived without a RowDescription
    #[error("query did not return a result set")]
    MissingRowDescription,

    /// CommandComplete tag could not be parsed
    #[error("unrecognized command tag: {0:?}")]
    InvalidCommandTag(String),

    /// EXPLAIN output row did not have the expected shape
    #[error("EXPLAIN row has unexpected shape: {0}")]
    InvalidExplainFormat(String),

    /// A select response was requested for a statement that is not a SELECT
    #[error("statement did not complete as a SELECT: {0:?}")]
    NotASelectQuery(String),

    /// EXECUTE referenced a statement name missing from the registry
    #[error("prepared statement {0:?} is not known on this connection")]
    UnknownPreparedStatement(String),

    /// Row deserialization failure
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Connection pool failure
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("port must not be zero")]
    InvalidPort,

    #[error("tls_client_cert requires tls_client_key")]
    ClientCertNeedsKey,
}

/// Severity of a server-reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the current operation; the server returns to ReadyForQuery
    Error,
    /// The session is being terminated by the server
    Fatal,
    /// The whole backend is going down
    Panic,
}

impl Severity {
    /// Parse the severity field of an ErrorResponse
    pub fn parse(s: &str) -> Self {
        match s {
            "FATAL" => Severity::Fatal,
            "PANIC" => Severity::Panic,
            _ => Severity::Error,
        }
    }

    /// FATAL and PANIC imply the connection is no longer usable
    pub fn is_fatal(self) -> bool {
        matches!(self, Severity::Fatal | Severity::Panic)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
            Severity::Panic => write!(f, "PANIC"),
        }
    }
}

/// Error reported by the server in an ErrorResponse message
#[derive(Debug, Clone, thiserror::Error)]
#[error("{severity}: {message} ({code})")]
pub struct ServerError {
    /// ERROR, FATAL or PANIC
    pub severity: Severity,
    /// SQLSTATE code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional detail, if the server sent one
    pub detail: Option<String>,
    /// Hint, if the server sent one
    pub hint: Option<String>,
}

/// Row deserialization errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid numeric literal: {0:?}")]
    InvalidNumber(String),

    #[error("invalid boolean literal: {0:?}")]
    InvalidBoolean(String),

    #[error("no enum variant named {0:?}")]
    InvalidEnum(String),

    #[error("malformed array literal: {0}")]
    InvalidArrayFormat(String),

    #[error("array has {actual} elements, expected {expected}")]
    ArrayLengthMismatch { expected: usize, actual: usize },

    #[error("text field of {len} bytes exceeds the {max}-byte cap")]
    StringTooLong { len: usize, max: usize },

    #[error("row ended before all schema fields were read")]
    IncompleteRead,

    #[error("SQL NULL in a non-optional field")]
    UnexpectedNull,
}

/// Connection pool errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("pool is closed")]
    Closed,

    #[error("timed out waiting for a pooled connection")]
    Timeout,

    #[error("no pooled connection is currently available")]
    NoAvailableConnections,

    #[error("no pool slot could be connected")]
    InitializationFailed,

    #[error("pooled connection could not be re-established")]
    ConnectionFailed,

    #[error("connection does not belong to this pool")]
    ConnectionNotFound,

    #[error("failed to apply session context: {0}")]
    RlsContext(String),

    #[error("failed to reset session after context error")]
    RlsResetFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("ERROR"), Severity::Error);
        assert_eq!(Severity::parse("FATAL"), Severity::Fatal);
        assert_eq!(Severity::parse("PANIC"), Severity::Panic);
        // Localized or unknown severities degrade to ERROR
        assert_eq!(Severity::parse("FEHLER"), Severity::Error);
    }

    #[test]
    fn test_severity_fatal() {
        assert!(!Severity::Error.is_fatal());
        assert!(Severity::Fatal.is_fatal());
        assert!(Severity::Panic.is_fatal());
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError {
            severity: Severity::Error,
            code: "42P01".to_string(),
            message: "relation \"t\" does not exist".to_string(),
            detail: None,
            hint: None,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("42P01"));
        assert!(rendered.starts_with("ERROR"));
    }

    #[test]
    fn test_pool_error_wraps_into_error() {
        let err: Error = PoolError::Timeout.into();
        assert!(matches!(err, Error::Pool(PoolError::Timeout)));
    }
}
