//! ApiVersions request handler.
//!
//! Advertises the APIs this broker serves and the version range of each, so
//! a client can pick a mutually supported version for later requests.

use bytes::Bytes;
use tracing::debug;

use crate::error::Result;
use crate::network::codec::ResponseFrame;
use crate::protocol::{ApiKey, ErrorCode, RequestEnvelope, ResponseHeaderVersion, WireWriter};

use super::ApiHandler;

/// Highest ApiVersions version this broker understands.
pub const MAX_API_VERSIONS_VERSION: u16 = 4;

/// Supported API keys and their version ranges.
const SUPPORTED_APIS: &[(ApiKey, i16, i16)] = &[
    (ApiKey::ApiVersions, 0, MAX_API_VERSIONS_VERSION as i16),
    (ApiKey::DescribeTopicPartitions, 0, 0),
];

/// Handler for ApiVersions requests.
#[derive(Debug, Default)]
pub struct ApiVersionsHandler;

impl ApiVersionsHandler {
    /// Create a new ApiVersions handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn error_code(api_version: u16) -> ErrorCode {
        if api_version <= MAX_API_VERSIONS_VERSION {
            ErrorCode::None
        } else {
            ErrorCode::UnsupportedVersion
        }
    }
}

impl ApiHandler for ApiVersionsHandler {
    type Request = ();

    fn parse(&self, _body: Bytes) -> Result<Self::Request> {
        Ok(())
    }

    fn handle(&self, _request: (), envelope: &RequestEnvelope) -> Result<ResponseFrame> {
        let error_code = Self::error_code(envelope.api_version);
        debug!(
            correlation_id = envelope.correlation_id,
            api_version = envelope.api_version,
            error_code = ?error_code,
            "handling ApiVersions"
        );

        // error_code + array len + 7 bytes per entry + throttle + tags
        let mut body = WireWriter::with_capacity(2 + 1 + 7 * SUPPORTED_APIS.len() + 4 + 1);
        body.put_i16(error_code.code());
        body.put_compact_array_len(Some(SUPPORTED_APIS.len()));
        for &(api_key, min_version, max_version) in SUPPORTED_APIS {
            body.put_u16(api_key.into());
            body.put_i16(min_version);
            body.put_i16(max_version);
            body.put_empty_tagged_fields();
        }
        body.put_i32(0); // throttle_time_ms
        body.put_empty_tagged_fields();

        Ok(ResponseFrame::new(
            envelope.correlation_id,
            ResponseHeaderVersion::V0,
            body.into_inner(),
        )
        .with_error_codes([error_code]))
    }
}
