//! Protocol message types.
//!
//! Every frame is a JSON object `{ "id": .., "body": { "type": .., .. } }`.
//! Requests and responses share the id space of one connection, which lets
//! any number of transactions and answer streams multiplex a single socket.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;

/// Correlation id chosen by the client for each request.
pub type RequestId = u64;

/// Server-assigned transaction id.
pub type TransactionId = u64;

/// Request id reserved for the handshake.
pub const HANDSHAKE_REQUEST_ID: RequestId = 0;
