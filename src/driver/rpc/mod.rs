//! Connection channel
//!
//! Socket-level plumbing shared by every handle derived from a connection.

mod channel;

pub(crate) use channel::{receive, ChannelOptions, ResponseReceiver, RpcChannel};
