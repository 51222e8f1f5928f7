//! Protocol error types.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Wire-level errors raised by the codec and message layer.
#[derive(Debug)]
pub enum ProtocolError {
    /// I/O error
    Io(io::Error),

    /// Frame body is not a valid message
    Json(serde_json::Error),

    /// Frame exceeds the configured maximum
    FrameTooLarge {
        /// Declared body length
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Handshake failed (version mismatch, unexpected reply)
    Handshake(String),

    /// Response does not match the request it answers
    UnexpectedResponse(String),

    /// Peer closed the connection
    ConnectionClosed,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
            ProtocolError::Json(e) => write!(f, "Malformed frame: {}", e),
            ProtocolError::FrameTooLarge { size, max } => {
                write!(f, "Frame too large: {} bytes (max: {})", size, max)
            }
            ProtocolError::Handshake(msg) => write!(f, "Handshake error: {}", msg),
            ProtocolError::UnexpectedResponse(msg) => write!(f, "Unexpected response: {}", msg),
            ProtocolError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(e) => Some(e),
            ProtocolError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        ProtocolError::Io(err)
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Json(err)
    }
}

// ============================================================================
// Server failures
// ============================================================================

/// Failure reported by the server in reply to a request.
///
/// Codes follow the `TDB.{Category}.{Kind}` format, see [`ErrorCode`].
/// Registry failures name the database or user they refer to in `subject`;
/// `message` is free text and is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFailure {
    /// Error code
    pub code: String,
    /// Human readable diagnostic
    pub message: String,
    /// Name of the database or user the failure is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ServerFailure {
    /// Create a new failure.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            subject: None,
        }
    }

    /// Attach the name the failure refers to.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Category part of the code (`Query` for `TDB.Query.Syntax`).
    pub fn category(&self) -> &str {
        self.code.split('.').nth(1).unwrap_or("")
    }

    /// Connection level failure (authentication, protocol version).
    pub fn is_connection_error(&self) -> bool {
        self.category() == "Connection"
    }

    /// Authentication failure.
    pub fn is_authentication_error(&self) -> bool {
        self.code == ErrorCode::UNAUTHENTICATED
    }

    /// Database registry failure.
    pub fn is_database_error(&self) -> bool {
        self.category() == "Database"
    }

    /// User registry failure.
    pub fn is_user_error(&self) -> bool {
        self.category() == "User"
    }

    /// Transaction failure.
    pub fn is_transaction_error(&self) -> bool {
        self.category() == "Transaction"
    }

    /// Query failure (syntax, semantic or runtime).
    pub fn is_query_error(&self) -> bool {
        self.category() == "Query"
    }
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServerFailure {}

/// Server error code constants.
pub struct ErrorCode;

impl ErrorCode {
    /// Wrong username or password
    pub const UNAUTHENTICATED: &'static str = "TDB.Connection.Unauthenticated";
    /// Client protocol version not supported
    pub const INCOMPATIBLE_PROTOCOL: &'static str = "TDB.Connection.IncompatibleProtocol";

    /// Database name already taken
    pub const DATABASE_EXISTS: &'static str = "TDB.Database.Exists";
    /// No database with that name
    pub const DATABASE_NOT_FOUND: &'static str = "TDB.Database.NotFound";

    /// Username already taken
    pub const USER_EXISTS: &'static str = "TDB.User.Exists";
    /// No user with that name
    pub const USER_NOT_FOUND: &'static str = "TDB.User.NotFound";

    /// Commit lost against a concurrent commit
    pub const TRANSACTION_CONFLICT: &'static str = "TDB.Transaction.Conflict";
    /// Transaction no longer open on the server
    pub const TRANSACTION_CLOSED: &'static str = "TDB.Transaction.Closed";
    /// Operation not allowed for the transaction type
    pub const TRANSACTION_INVALID_OPERATION: &'static str = "TDB.Transaction.InvalidOperation";

    /// Query text does not parse
    pub const QUERY_SYNTAX: &'static str = "TDB.Query.Syntax";
    /// Query refers to unknown or mismatched types
    pub const QUERY_SEMANTIC: &'static str = "TDB.Query.Semantic";
    /// Query failed while running
    pub const QUERY_RUNTIME: &'static str = "TDB.Query.Runtime";

    /// Unexpected server fault
    pub const INTERNAL: &'static str = "TDB.Server.Internal";
}
