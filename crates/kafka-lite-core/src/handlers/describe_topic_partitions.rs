//! DescribeTopicPartitions request handler.
//!
//! There is no topic catalog behind this broker, so every requested topic is
//! answered as unknown with a nil topic id, no partitions and the full set of
//! topic operations in its authorized-operations bitmask.
//!
//! Request body:
//!
//! ```text
//! topics: compact array of compact string
//! response_partition_limit: u32
//! cursor: i8 length + bytes (-1 = none)
//! tagged fields
//! ```

use bytes::Bytes;
use tracing::debug;

use crate::error::{BrokerError, Result};
use crate::network::codec::ResponseFrame;
use crate::protocol::{
    AclOperations, ApiKey, ErrorCode, RequestEnvelope, ResponseHeaderVersion, TopicId,
    WireReader, WireWriter,
};

use super::ApiHandler;

/// Cursor length that marks "no cursor".
const NULL_CURSOR: i8 = -1;

/// A parsed DescribeTopicPartitions request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeTopicPartitionsRequest {
    /// Topic names in the order the client listed them.
    pub topics: Vec<String>,
    /// Maximum number of partitions the client wants back.
    pub response_partition_limit: u32,
    /// Where to resume a paginated listing.
    pub cursor: Option<String>,
}

impl DescribeTopicPartitionsRequest {
    fn decode(reader: &mut WireReader) -> Result<Self> {
        let count = reader
            .read_compact_array_len("topics")?
            .ok_or_else(|| BrokerError::malformed("topics", "null topic array"))?;
        let mut topics = Vec::with_capacity(count);
        for _ in 0..count {
            topics.push(reader.read_compact_string("topic_name")?);
        }
        let response_partition_limit = reader.read_u32("response_partition_limit")?;
        let cursor = read_cursor(reader)?;
        reader.skip_tagged_fields("request_tagged_fields")?;

        Ok(Self {
            topics,
            response_partition_limit,
            cursor,
        })
    }

    /// Encode the request body.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MalformedField`] if the cursor is longer than
    /// an `i8` length can declare.
    pub fn encode(&self) -> Result<Bytes> {
        let mut w = WireWriter::new();
        w.put_compact_array_len(Some(self.topics.len()));
        for topic in &self.topics {
            w.put_compact_string(topic);
        }
        w.put_u32(self.response_partition_limit);
        put_cursor(&mut w, self.cursor.as_deref())?;
        w.put_empty_tagged_fields();
        Ok(w.into_inner().freeze())
    }
}

fn read_cursor(reader: &mut WireReader) -> Result<Option<String>> {
    match reader.read_i8("cursor")? {
        NULL_CURSOR => Ok(None),
        len if len < 0 => Err(BrokerError::malformed(
            "cursor",
            format!("negative cursor length {len}"),
        )),
        len => {
            let raw = reader.read_bytes("cursor", len as usize)?;
            String::from_utf8(raw.to_vec())
                .map(Some)
                .map_err(|e| BrokerError::malformed("cursor", format!("invalid UTF-8: {e}")))
        }
    }
}

fn put_cursor(w: &mut WireWriter, cursor: Option<&str>) -> Result<()> {
    match cursor {
        Some(c) => {
            let len = i8::try_from(c.len()).map_err(|_| {
                BrokerError::malformed("cursor", format!("{} bytes exceeds i8 length", c.len()))
            })?;
            w.put_i8(len);
            w.put_slice(c.as_bytes());
        }
        None => w.put_i8(NULL_CURSOR),
    }
    Ok(())
}

/// One partition entry of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    pub error_code: ErrorCode,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    /// `None` is written as a null array.
    pub eligible_leader_replicas: Option<Vec<i32>>,
    pub last_known_elr: Option<Vec<i32>>,
    pub offline_replicas: Vec<i32>,
}

fn put_broker_ids(w: &mut WireWriter, ids: Option<&[i32]>) {
    w.put_compact_array_len(ids.map(<[i32]>::len));
    for &id in ids.unwrap_or_default() {
        w.put_i32(id);
    }
}

impl PartitionDescriptor {
    fn encode(&self, w: &mut WireWriter) {
        w.put_i16(self.error_code.code());
        w.put_i32(self.partition_index);
        w.put_i32(self.leader_id);
        w.put_i32(self.leader_epoch);
        put_broker_ids(w, Some(&self.replica_nodes));
        put_broker_ids(w, Some(&self.isr_nodes));
        put_broker_ids(w, self.eligible_leader_replicas.as_deref());
        put_broker_ids(w, self.last_known_elr.as_deref());
        put_broker_ids(w, Some(&self.offline_replicas));
        w.put_empty_tagged_fields();
    }
}

/// One topic entry in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescriptor {
    pub error_code: ErrorCode,
    pub name: String,
    pub topic_id: TopicId,
    pub is_internal: bool,
    /// Always empty for unknown topics.
    pub partitions: Vec<PartitionDescriptor>,
    pub authorized_operations: AclOperations,
}

impl TopicDescriptor {
    /// Descriptor for a topic the broker knows nothing about.
    #[must_use]
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            error_code: ErrorCode::UnknownTopicOrPartition,
            name: name.into(),
            topic_id: TopicId::nil(),
            is_internal: false,
            partitions: Vec::new(),
            authorized_operations: AclOperations::TOPIC,
        }
    }

    fn encode(&self, w: &mut WireWriter) {
        w.put_i16(self.error_code.code());
        w.put_compact_string(&self.name);
        w.put_uuid(&self.topic_id);
        w.put_bool(self.is_internal);
        w.put_compact_array_len(Some(self.partitions.len()));
        for partition in &self.partitions {
            partition.encode(w);
        }
        w.put_u32(self.authorized_operations.bits());
        w.put_empty_tagged_fields();
    }
}

/// Handler for DescribeTopicPartitions requests.
#[derive(Debug, Default)]
pub struct DescribeTopicPartitionsHandler;

impl DescribeTopicPartitionsHandler {
    /// Create a new DescribeTopicPartitions handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ApiHandler for DescribeTopicPartitionsHandler {
    type Request = DescribeTopicPartitionsRequest;

    fn parse(&self, body: Bytes) -> Result<Self::Request> {
        let mut reader = WireReader::new(body);
        let request = DescribeTopicPartitionsRequest::decode(&mut reader).map_err(|e| {
            BrokerError::MalformedRequest {
                api_key: ApiKey::DescribeTopicPartitions.into(),
                reason: e.to_string(),
            }
        })?;
        if !reader.is_empty() {
            debug!(trailing = reader.remaining(), "ignoring trailing request bytes");
        }
        Ok(request)
    }

    fn handle(
        &self,
        request: DescribeTopicPartitionsRequest,
        envelope: &RequestEnvelope,
    ) -> Result<ResponseFrame> {
        debug!(
            correlation_id = envelope.correlation_id,
            topics = request.topics.len(),
            response_partition_limit = request.response_partition_limit,
            cursor = ?request.cursor,
            "handling DescribeTopicPartitions"
        );

        let topics: Vec<TopicDescriptor> = request
            .topics
            .into_iter()
            .map(TopicDescriptor::unknown)
            .collect();

        let mut body = WireWriter::new();
        body.put_i32(0); // throttle_time_ms
        body.put_compact_array_len(Some(topics.len()));
        for topic in &topics {
            topic.encode(&mut body);
        }
        // There is never a further page
        put_cursor(&mut body, None)?;
        body.put_empty_tagged_fields();

        Ok(ResponseFrame::new(
            envelope.correlation_id,
            ResponseHeaderVersion::V1,
            body.into_inner(),
        )
        .with_error_codes(topics.iter().map(|t| t.error_code)))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::handlers::ProtocolHandler;
    use proptest::prelude::*;

    fn request_strategy() -> impl Strategy<Value = DescribeTopicPartitionsRequest> {
        (
            proptest::collection::vec("[a-zA-Z0-9._-]{1,249}", 1..40),
            any::<u32>(),
            proptest::option::of("[a-z0-9-]{0,127}"),
        )
            .prop_map(|(topics, response_partition_limit, cursor)| {
                DescribeTopicPartitionsRequest {
                    topics,
                    response_partition_limit,
                    cursor,
                }
            })
    }

    proptest! {
        #[test]
        fn prop_request_round_trip(request in request_strategy()) {
            let handler = DescribeTopicPartitionsHandler::new();
            let parsed = handler.parse(request.encode().unwrap()).unwrap();
            prop_assert_eq!(parsed, request);
        }

        #[test]
        fn prop_topics_answered_in_request_order(request in request_strategy()) {
            let envelope = RequestEnvelope {
                api_key: ApiKey::DescribeTopicPartitions.into(),
                api_version: 0,
                correlation_id: 7,
                client_id: None,
                body: request.encode().unwrap(),
            };
            let response = DescribeTopicPartitionsHandler::new().process(&envelope).unwrap();
            prop_assert_eq!(response.error_codes.len(), request.topics.len());

            let mut r = WireReader::new(response.body.freeze());
            prop_assert_eq!(r.read_i32("throttle_time_ms").unwrap(), 0);
            let count = r.read_compact_array_len("topics").unwrap();
            prop_assert_eq!(count, Some(request.topics.len()));
            for expected in &request.topics {
                prop_assert_eq!(r.read_i16("error_code").unwrap(), 3);
                prop_assert_eq!(&r.read_compact_string("name").unwrap(), expected);
                prop_assert_eq!(r.read_uuid("topic_id").unwrap(), TopicId::nil());
                prop_assert_eq!(r.read_u8("is_internal").unwrap(), 0);
                prop_assert_eq!(r.read_compact_array_len("partitions").unwrap(), Some(0));
                prop_assert_eq!(
                    r.read_u32("authorized_operations").unwrap(),
                    AclOperations::TOPIC.bits()
                );
                prop_assert_eq!(r.skip_tagged_fields("tags").unwrap(), 0);
            }
            prop_assert_eq!(r.read_u8("next_cursor").unwrap(), 0xFF);
            prop_assert_eq!(r.skip_tagged_fields("tags").unwrap(), 0);
            prop_assert!(r.is_empty());
        }
    }
}
