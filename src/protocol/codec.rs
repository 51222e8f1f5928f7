//! Frame codec for tokio_util.
//!
//! Every message travels as one frame: a 4-byte big-endian length prefix
//! followed by the UTF-8 JSON body. [`FrameCodec`] handles the framing,
//! [`MessageCodec`] layers serde on top of it.

use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use super::error::ProtocolError;
use super::message::{RequestFrame, ResponseFrame};

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame body size (16MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length-prefixed frame codec.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximum frame body size
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec with custom max frame size.
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Maximum frame body size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if length > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            });
        }

        let total = LENGTH_PREFIX_SIZE + length;
        if src.len() < total {
            // Make room for the rest of the frame
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(src.split_to(length)))
    }
}

impl<'a> Encoder<&'a [u8]> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }

        dst.reserve(LENGTH_PREFIX_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(item);
        Ok(())
    }
}

/// JSON message codec over [`FrameCodec`].
///
/// `Out` is the message type written, `In` the message type read.
pub struct MessageCodec<Out, In> {
    frames: FrameCodec,
    _marker: PhantomData<fn(Out) -> In>,
}

impl<Out, In> MessageCodec<Out, In> {
    /// Create a codec with default settings.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec with custom max frame size.
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            frames: FrameCodec::with_max_size(max_frame_size),
            _marker: PhantomData,
        }
    }
}

impl<Out, In> Default for MessageCodec<Out, In> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Out, In> std::fmt::Debug for MessageCodec<Out, In> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCodec")
            .field("max_frame_size", &self.frames.max_frame_size())
            .finish()
    }
}

impl<Out: Serialize, In> Encoder<Out> for MessageCodec<Out, In> {
    type Error = ProtocolError;

    fn encode(&mut self, item: Out, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        self.frames.encode(body.as_slice(), dst)
    }
}

impl<Out, In: DeserializeOwned> Decoder for MessageCodec<Out, In> {
    type Item = In;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame)?)),
            None => Ok(None),
        }
    }
}

/// Client side codec: writes requests, reads responses.
pub type ClientCodec = MessageCodec<RequestFrame, ResponseFrame>;

/// Server side codec: writes responses, reads requests.
pub type ServerCodec = MessageCodec<ResponseFrame, RequestFrame>;
