//! Request and response headers.
//!
//! Request header (v2), after the frame length prefix:
//!
//! ```text
//! api_key: u16 | api_version: u16 | correlation_id: u32
//! client_id: i16 length + bytes (0 or -1 = absent)
//! tagged fields
//! body...
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{BrokerError, Result};

use super::primitives::{WireReader, WireWriter};

/// Fixed header bytes preceding the client id payload.
pub const REQUEST_HEADER_PREFIX_LEN: usize = 10;

/// A decoded request: header fields plus the unparsed operation body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// The API key (operation code).
    pub api_key: u16,
    /// The API version.
    pub api_version: u16,
    /// The correlation ID for request/response matching.
    pub correlation_id: u32,
    /// Client identifier, if the client sent one.
    pub client_id: Option<String>,
    /// Operation-specific body bytes.
    pub body: Bytes,
}

impl RequestEnvelope {
    /// Decode a request from a complete frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::HeaderTooShort`] when the frame cannot hold the
    /// fixed prefix, or [`BrokerError::MalformedField`] when the client id or
    /// tagged fields run past the end of the frame.
    pub fn decode(frame: Bytes) -> Result<Self> {
        if frame.len() < REQUEST_HEADER_PREFIX_LEN {
            return Err(BrokerError::HeaderTooShort { len: frame.len() });
        }

        let mut reader = WireReader::new(frame);
        let api_key = reader.read_u16("api_key")?;
        let api_version = reader.read_u16("api_version")?;
        let correlation_id = reader.read_u32("correlation_id")?;
        let client_id = reader
            .read_nullable_string("client_id")?
            .filter(|id| !id.is_empty());
        reader.skip_tagged_fields("request_header_tagged_fields")?;

        Ok(Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
            body: reader.into_remaining(),
        })
    }

    /// Encode the envelope back into a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MalformedField`] if the client id does not fit
    /// an int16 length.
    pub fn encode(&self) -> Result<BytesMut> {
        let mut w = WireWriter::with_capacity(REQUEST_HEADER_PREFIX_LEN + 1 + self.body.len());
        w.put_u16(self.api_key);
        w.put_u16(self.api_version);
        w.put_u32(self.correlation_id);
        match self.client_id.as_deref() {
            Some(id) => w.put_nullable_string("client_id", Some(id))?,
            None => w.put_i16(0),
        }
        w.put_empty_tagged_fields();
        w.put_slice(&self.body);
        Ok(w.into_inner())
    }
}

/// Response header layout.
///
/// ApiVersions always answers with v0 so that a client that does not yet
/// know the broker's versions can still parse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHeaderVersion {
    /// Correlation id only.
    V0,
    /// Correlation id followed by an empty tagged-field section.
    V1,
}

impl ResponseHeaderVersion {
    /// Encoded size in bytes.
    #[must_use]
    pub fn len(self) -> usize {
        match self {
            Self::V0 => 4,
            Self::V1 => 5,
        }
    }

    /// Write the header for `correlation_id` into `dst`.
    pub fn encode(self, correlation_id: u32, dst: &mut BytesMut) {
        dst.put_u32(correlation_id);
        if self == Self::V1 {
            dst.put_u8(0);
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn envelope_strategy() -> impl Strategy<Value = RequestEnvelope> {
        (
            any::<u16>(),
            any::<u16>(),
            any::<u32>(),
            proptest::option::of("[a-zA-Z0-9._-]{1,50}"),
            proptest::collection::vec(any::<u8>(), 0..128),
        )
            .prop_map(|(api_key, api_version, correlation_id, client_id, body)| {
                RequestEnvelope {
                    api_key,
                    api_version,
                    correlation_id,
                    client_id,
                    body: Bytes::from(body),
                }
            })
    }

    proptest! {
        #[test]
        fn prop_envelope_round_trip(envelope in envelope_strategy()) {
            let frame = envelope.encode().unwrap().freeze();
            let decoded = RequestEnvelope::decode(frame).unwrap();
            prop_assert_eq!(decoded, envelope);
        }

        #[test]
        fn prop_short_frames_are_rejected(
            bytes in proptest::collection::vec(any::<u8>(), 0..REQUEST_HEADER_PREFIX_LEN)
        ) {
            let len = bytes.len();
            let err = RequestEnvelope::decode(Bytes::from(bytes)).unwrap_err();
            prop_assert!(matches!(err, BrokerError::HeaderTooShort { len: l } if l == len), "unexpected error: {:?}", err);
        }

        #[test]
        fn prop_arbitrary_frames_never_panic(
            bytes in proptest::collection::vec(any::<u8>(), 0..64)
        ) {
            let _ = RequestEnvelope::decode(Bytes::from(bytes));
        }
    }
}
