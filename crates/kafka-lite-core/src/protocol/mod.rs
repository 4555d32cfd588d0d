//! Kafka wire protocol building blocks.
//!
//! - [`primitives`] - bound-checked readers and writers for wire types
//! - [`header`] - request envelope decoding and response headers
//! - [`types`] - API keys, error codes and ACL operation bits

pub mod header;
pub mod primitives;
pub mod types;

pub use header::{RequestEnvelope, ResponseHeaderVersion, REQUEST_HEADER_PREFIX_LEN};
pub use primitives::{WireReader, WireWriter};
pub use types::{AclOperations, ApiKey, ErrorCode, TopicId, UNKNOWN_API_NAME};
