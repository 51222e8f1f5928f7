//! Request messages.
//!
//! Request messages are sent from the client to the server. Each one is
//! wrapped in a [`RequestFrame`] carrying the id its responses will echo.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RequestId, TransactionId};

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Read-only snapshot
    Read,
    /// Data writes
    Write,
    /// Schema definition (and data writes)
    Schema,
}

impl TransactionType {
    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Read => "read",
            TransactionType::Write => "write",
            TransactionType::Schema => "schema",
        }
    }

    /// Check if this mode can mutate data or schema.
    pub fn is_writable(&self) -> bool {
        !matches!(self, TransactionType::Read)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction parameters sent with TRANSACTION_OPEN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionParameters {
    /// Server-side transaction timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_timeout_millis: Option<u64>,
    /// Schema lock acquisition timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_lock_acquire_timeout_millis: Option<u64>,
}

/// Query parameters sent with QUERY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameters {
    /// Attach types to returned instances
    pub include_instance_types: bool,
    /// Answers sent before the server waits for STREAM_CONTINUE
    pub prefetch_size: usize,
}

/// Handshake request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOpen {
    /// Protocol version spoken by the client
    pub protocol_version: u32,
    /// Driver language identifier
    pub driver_lang: String,
    /// Driver version
    pub driver_version: String,
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

/// Client request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Handshake, always the first frame on a connection
    ConnectionOpen(ConnectionOpen),
    /// Polite goodbye before the socket is dropped
    ConnectionClose,

    /// Check whether a database exists
    DatabasesContains {
        /// Database name
        name: String,
    },
    /// Create a database
    DatabasesCreate {
        /// Database name
        name: String,
    },
    /// Fetch a database handle
    DatabasesGet {
        /// Database name
        name: String,
    },
    /// List all databases
    DatabasesAll,
    /// Delete a database
    DatabaseDelete {
        /// Database name
        name: String,
    },
    /// Full schema as define query text
    DatabaseSchema {
        /// Database name
        name: String,
    },
    /// Type schema as define query text
    DatabaseTypeSchema {
        /// Database name
        name: String,
    },

    /// Check whether a user exists
    UsersContains {
        /// Username
        name: String,
    },
    /// Create a user
    UsersCreate {
        /// Username
        name: String,
        /// Initial password
        password: String,
    },
    /// Fetch a user handle
    UsersGet {
        /// Username
        name: String,
    },
    /// List all users
    UsersAll,
    /// Replace a user's password
    UserUpdatePassword {
        /// Username
        name: String,
        /// New password
        password: String,
    },
    /// Delete a user
    UserDelete {
        /// Username
        name: String,
    },

    /// Open a transaction
    TransactionOpen {
        /// Database name
        database: String,
        /// Access mode
        transaction_type: TransactionType,
        /// Timeouts
        #[serde(default)]
        parameters: TransactionParameters,
    },
    /// Commit and close a transaction
    TransactionCommit {
        /// Server-assigned transaction id
        transaction: TransactionId,
    },
    /// Discard uncommitted changes
    TransactionRollback {
        /// Server-assigned transaction id
        transaction: TransactionId,
    },
    /// Release a transaction
    TransactionClose {
        /// Server-assigned transaction id
        transaction: TransactionId,
    },

    /// Run a query inside a transaction
    Query {
        /// Server-assigned transaction id
        transaction: TransactionId,
        /// Query text, passed through uninterpreted
        query: String,
        /// Answer shaping and paging
        parameters: QueryParameters,
    },
    /// Request the next batch of a paused answer stream
    StreamContinue {
        /// Server-assigned transaction id
        transaction: TransactionId,
    },
}

impl Request {
    /// Message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::ConnectionOpen(_) => "CONNECTION_OPEN",
            Request::ConnectionClose => "CONNECTION_CLOSE",
            Request::DatabasesContains { .. } => "DATABASES_CONTAINS",
            Request::DatabasesCreate { .. } => "DATABASES_CREATE",
            Request::DatabasesGet { .. } => "DATABASES_GET",
            Request::DatabasesAll => "DATABASES_ALL",
            Request::DatabaseDelete { .. } => "DATABASE_DELETE",
            Request::DatabaseSchema { .. } => "DATABASE_SCHEMA",
            Request::DatabaseTypeSchema { .. } => "DATABASE_TYPE_SCHEMA",
            Request::UsersContains { .. } => "USERS_CONTAINS",
            Request::UsersCreate { .. } => "USERS_CREATE",
            Request::UsersGet { .. } => "USERS_GET",
            Request::UsersAll => "USERS_ALL",
            Request::UserUpdatePassword { .. } => "USER_UPDATE_PASSWORD",
            Request::UserDelete { .. } => "USER_DELETE",
            Request::TransactionOpen { .. } => "TRANSACTION_OPEN",
            Request::TransactionCommit { .. } => "TRANSACTION_COMMIT",
            Request::TransactionRollback { .. } => "TRANSACTION_ROLLBACK",
            Request::TransactionClose { .. } => "TRANSACTION_CLOSE",
            Request::Query { .. } => "QUERY",
            Request::StreamContinue { .. } => "STREAM_CONTINUE",
        }
    }

    /// Transaction this request belongs to, if any.
    pub fn transaction(&self) -> Option<TransactionId> {
        match self {
            Request::TransactionCommit { transaction }
            | Request::TransactionRollback { transaction }
            | Request::TransactionClose { transaction }
            | Request::Query { transaction, .. }
            | Request::StreamContinue { transaction } => Some(*transaction),
            _ => None,
        }
    }
}

// Credentials never reach the logs.
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::ConnectionOpen(open) => f
                .debug_struct("ConnectionOpen")
                .field("protocol_version", &open.protocol_version)
                .field("driver_lang", &open.driver_lang)
                .field("driver_version", &open.driver_version)
                .field("username", &open.username)
                .finish_non_exhaustive(),
            Request::Query { transaction, query, parameters } => f
                .debug_struct("Query")
                .field("transaction", transaction)
                .field("query", query)
                .field("parameters", parameters)
                .finish(),
            other => match other.transaction() {
                Some(transaction) => write!(f, "{} {{ transaction: {} }}", other.name(), transaction),
                None => f.write_str(other.name()),
            },
        }
    }
}

/// Request with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id
    pub id: RequestId,
    /// Request body
    pub body: Request,
}

impl RequestFrame {
    /// Create a new frame.
    pub fn new(id: RequestId, body: Request) -> Self {
        Self { id, body }
    }
}
