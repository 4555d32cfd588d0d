//! Kafka protocol frame codec.
//!
//! Implements tokio's `Decoder` and `Encoder` traits for Kafka wire protocol frames.
//! Kafka uses a simple framing format: 4-byte big-endian length prefix followed by
//! the message bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::BrokerError;
use crate::protocol::{ErrorCode, ResponseHeaderVersion};

use super::frame::LENGTH_PREFIX_LEN;

/// Maximum frame size (100 MB by default).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Codec for Kafka wire protocol frames.
///
/// Decoding yields the bytes after the length prefix; header parsing is left
/// to [`RequestEnvelope::decode`](crate::protocol::RequestEnvelope::decode).
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new codec with default max frame size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a new codec with custom max frame size.
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = BrokerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        // Read length without consuming
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(BrokerError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            });
        }

        if src.len() < LENGTH_PREFIX_LEN + length {
            src.reserve(LENGTH_PREFIX_LEN + length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        Ok(Some(src.split_to(length).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Stream ended inside a frame
        let expected = if src.len() < LENGTH_PREFIX_LEN {
            LENGTH_PREFIX_LEN
        } else {
            u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize
        };
        let received = if src.len() < LENGTH_PREFIX_LEN {
            src.len()
        } else {
            src.len() - LENGTH_PREFIX_LEN
        };
        src.clear();
        Err(BrokerError::TruncatedFrame { expected, received })
    }
}

/// A response frame to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// The correlation ID (must match the request).
    pub correlation_id: u32,
    /// Which response header layout precedes the body.
    pub header_version: ResponseHeaderVersion,
    /// The response body bytes.
    pub body: BytesMut,
    /// Error codes embedded in the body, one per response entry.
    ///
    /// Not written to the wire; the connection reports them as metrics.
    pub error_codes: Vec<ErrorCode>,
}

impl ResponseFrame {
    #[must_use]
    pub fn new(correlation_id: u32, header_version: ResponseHeaderVersion, body: BytesMut) -> Self {
        Self {
            correlation_id,
            header_version,
            body,
            error_codes: Vec::new(),
        }
    }

    /// Attach the error codes the body carries.
    #[must_use]
    pub fn with_error_codes(mut self, codes: impl IntoIterator<Item = ErrorCode>) -> Self {
        self.error_codes.extend(codes);
        self
    }

    /// Number of bytes the length prefix will declare.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.header_version.len() + self.body.len()
    }

    /// Response header followed by the body, without the length prefix.
    #[must_use]
    pub fn to_payload(&self) -> BytesMut {
        let mut payload = BytesMut::with_capacity(self.payload_len());
        self.header_version.encode(self.correlation_id, &mut payload);
        payload.extend_from_slice(&self.body);
        payload
    }
}

impl Encoder<ResponseFrame> for FrameCodec {
    type Error = BrokerError;

    fn encode(&mut self, item: ResponseFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let total_len = item.payload_len();
        let declared = u32::try_from(total_len).map_err(|_| BrokerError::FrameTooLarge {
            size: total_len,
            max: u32::MAX as usize,
        })?;

        dst.reserve(LENGTH_PREFIX_LEN + total_len);
        dst.put_u32(declared);
        item.header_version.encode(item.correlation_id, dst);
        dst.extend_from_slice(&item.body);

        Ok(())
    }
}
