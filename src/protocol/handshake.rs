//! Connection handshake.
//!
//! The handshake is the first exchange on a new socket:
//! 1. Client sends CONNECTION_OPEN with its protocol version and credentials
//! 2. Server replies CONNECTION_OPENED, or FAILURE with a Connection code
//!
//! No other request is accepted before the handshake succeeds.

use super::error::{ErrorCode, ProtocolError, ProtocolResult, ServerFailure};
use super::message::{ConnectionOpen, Request, Response};

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u32 = 3;

/// Driver language reported to the server.
pub const DRIVER_LANG: &str = "rust";

/// Driver version reported to the server.
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the CONNECTION_OPEN request.
///
/// `driver_lang` is normally [`DRIVER_LANG`]; embedders may report their own.
pub fn open_request(username: &str, password: &str, driver_lang: &str) -> Request {
    Request::ConnectionOpen(ConnectionOpen {
        protocol_version: PROTOCOL_VERSION,
        driver_lang: driver_lang.to_string(),
        driver_version: DRIVER_VERSION.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Server side check of the client's protocol version.
pub fn check_version(open: &ConnectionOpen) -> Result<(), ServerFailure> {
    if open.protocol_version == PROTOCOL_VERSION {
        Ok(())
    } else {
        Err(ServerFailure::new(
            ErrorCode::INCOMPATIBLE_PROTOCOL,
            format!(
                "Client protocol version {} is not supported (server speaks {})",
                open.protocol_version, PROTOCOL_VERSION
            ),
        ))
    }
}

/// Outcome of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Server-assigned connection id
    pub connection_id: String,
    /// Server version string
    pub server_version: String,
}

/// Interpret the handshake reply.
///
/// Returns `Ok(Err(failure))` when the server refused the connection.
pub fn accept_reply(reply: Response) -> ProtocolResult<Result<HandshakeResult, ServerFailure>> {
    match reply {
        Response::ConnectionOpened {
            connection_id,
            server_version,
        } => Ok(Ok(HandshakeResult {
            connection_id,
            server_version,
        })),
        Response::Failure(failure) => Ok(Err(failure)),
        other => Err(ProtocolError::Handshake(format!(
            "expected CONNECTION_OPENED, received {}",
            other.name()
        ))),
    }
}
