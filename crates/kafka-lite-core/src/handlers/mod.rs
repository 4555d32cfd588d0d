//! Kafka protocol request handlers.
//!
//! Each handler parses the body of one API and builds its response. Handlers
//! are registered in a [`HandlerRegistry`] by API key and shared by every
//! connection, so they hold no per-request state: whatever `parse` produces
//! is handed straight to `handle`.

pub mod api_versions;
pub mod describe_topic_partitions;
pub mod registry;

pub use api_versions::ApiVersionsHandler;
pub use describe_topic_partitions::{
    DescribeTopicPartitionsHandler, DescribeTopicPartitionsRequest, PartitionDescriptor,
    TopicDescriptor,
};
pub use registry::HandlerRegistry;

use bytes::Bytes;

use crate::error::Result;
use crate::network::codec::ResponseFrame;
use crate::protocol::RequestEnvelope;

/// A handler for one API, with a typed request.
pub trait ApiHandler: Send + Sync {
    /// The parsed request body.
    type Request: Send;

    /// Parse the operation-specific request body.
    fn parse(&self, body: Bytes) -> Result<Self::Request>;

    /// Build the response for a parsed request.
    fn handle(&self, request: Self::Request, envelope: &RequestEnvelope) -> Result<ResponseFrame>;
}

/// Object-safe handler interface stored in the registry.
pub trait ProtocolHandler: Send + Sync {
    /// Parse the envelope body and produce the response.
    fn process(&self, envelope: &RequestEnvelope) -> Result<ResponseFrame>;
}

impl<H: ApiHandler> ProtocolHandler for H {
    fn process(&self, envelope: &RequestEnvelope) -> Result<ResponseFrame> {
        let request = self.parse(envelope.body.clone())?;
        self.handle(request, envelope)
    }
}
