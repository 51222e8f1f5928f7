//! # Wire Protocol
//!
//! Low-level protocol used between the driver and the database server.
//!
//! ## Overview
//!
//! The protocol is a request/response exchange over a single TCP socket,
//! with streamed answers for queries. This module provides:
//!
//! - **Codec** - Length-prefixed JSON framing for Tokio
//! - **Message Types** - Request/response messages and their correlation ids
//! - **Handshake** - Protocol version and credential exchange
//! - **Errors** - Wire errors and server failure codes
//!
//! ## Streaming
//!
//! A QUERY request is answered by a header (`QUERY_OK`, `QUERY_ROWS` or
//! `QUERY_DOCUMENTS`). Row and document headers are followed by answer
//! parts. After `prefetch_size` answers the server sends `CONTINUE` and
//! waits for a `STREAM_CONTINUE` on the same request id; `STREAM_DONE` or
//! `FAILURE` ends the stream.
//!
//! ## Note
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! interacting with the protocol directly.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;

pub use codec::{ClientCodec, FrameCodec, MessageCodec, ServerCodec, DEFAULT_MAX_FRAME_SIZE};
pub use error::{ErrorCode, ProtocolError, ProtocolResult, ServerFailure};
pub use handshake::{HandshakeResult, PROTOCOL_VERSION};
pub use message::{
    ConnectionOpen, QueryParameters, QueryType, Request, RequestFrame, RequestId, Response,
    ResponseFrame, TransactionId, TransactionParameters, TransactionType,
};
