//! Response messages.
//!
//! Response messages are sent from the server to the client. A request is
//! answered by exactly one response, except QUERY, whose header may be
//! followed by answer parts, CONTINUE markers and a final STREAM_DONE.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RequestId, TransactionId};
use crate::concept::{Concept, Node};
use crate::protocol::error::ServerFailure;

/// Kind of query, reported in every query header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Read query
    Read,
    /// Data write query
    Write,
    /// Schema definition query
    Schema,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Read => f.write_str("read"),
            QueryType::Write => f.write_str("write"),
            QueryType::Schema => f.write_str("schema"),
        }
    }
}

/// Server response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Handshake accepted
    ConnectionOpened {
        /// Server-assigned connection id
        connection_id: String,
        /// Server version string
        server_version: String,
    },
    /// Request completed with nothing to return
    Done,
    /// Boolean answer (DATABASES_CONTAINS, USERS_CONTAINS)
    Contains {
        /// Whether the name exists
        value: bool,
    },
    /// Single database
    Database {
        /// Database name
        name: String,
    },
    /// All databases
    Databases {
        /// Database names, sorted
        names: Vec<String>,
    },
    /// Single user
    User {
        /// Username
        name: String,
    },
    /// All users
    Users {
        /// Usernames, sorted
        names: Vec<String>,
    },
    /// Schema text
    Schema {
        /// Define query text
        schema: String,
    },
    /// Transaction opened
    TransactionOpened {
        /// Server-assigned transaction id
        transaction: TransactionId,
    },

    /// Query header: no answers follow
    QueryOk {
        /// Kind of query
        query_type: QueryType,
    },
    /// Query header: row parts follow
    QueryRows {
        /// Kind of query
        query_type: QueryType,
        /// Projected variable names, in row order
        columns: Vec<String>,
    },
    /// Query header: document parts follow
    QueryDocuments {
        /// Kind of query
        query_type: QueryType,
    },
    /// Batch of rows, one entry per column
    RowsPart {
        /// Rows; `None` marks an unbound optional variable
        rows: Vec<Vec<Option<Concept>>>,
    },
    /// Batch of documents
    DocumentsPart {
        /// Document trees
        documents: Vec<Node>,
    },
    /// Prefetch window exhausted; send STREAM_CONTINUE for more
    Continue,
    /// Answer stream finished
    StreamDone,

    /// Request failed
    Failure(ServerFailure),
}

impl Response {
    /// Message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Response::ConnectionOpened { .. } => "CONNECTION_OPENED",
            Response::Done => "DONE",
            Response::Contains { .. } => "CONTAINS",
            Response::Database { .. } => "DATABASE",
            Response::Databases { .. } => "DATABASES",
            Response::User { .. } => "USER",
            Response::Users { .. } => "USERS",
            Response::Schema { .. } => "SCHEMA",
            Response::TransactionOpened { .. } => "TRANSACTION_OPENED",
            Response::QueryOk { .. } => "QUERY_OK",
            Response::QueryRows { .. } => "QUERY_ROWS",
            Response::QueryDocuments { .. } => "QUERY_DOCUMENTS",
            Response::RowsPart { .. } => "ROWS_PART",
            Response::DocumentsPart { .. } => "DOCUMENTS_PART",
            Response::Continue => "CONTINUE",
            Response::StreamDone => "STREAM_DONE",
            Response::Failure(_) => "FAILURE",
        }
    }

    /// Check if this is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failure(_))
    }

    /// Check if no further frames follow for this request id.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Response::QueryRows { .. }
                | Response::QueryDocuments { .. }
                | Response::RowsPart { .. }
                | Response::DocumentsPart { .. }
                | Response::Continue
        )
    }

    /// Convert a failure into an error, pass anything else through.
    pub fn into_result(self) -> Result<Response, ServerFailure> {
        match self {
            Response::Failure(failure) => Err(failure),
            other => Ok(other),
        }
    }
}

/// Response with the id of the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Correlation id
    pub id: RequestId,
    /// Response body
    pub body: Response,
}

impl ResponseFrame {
    /// Create a new frame.
    pub fn new(id: RequestId, body: Response) -> Self {
        Self { id, body }
    }
}
